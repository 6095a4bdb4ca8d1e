// src/error.rs

use crate::solver::explain::Explanation;
use thiserror::Error;

/// Core error types for DPMS
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A repository could not be reached and no cached metadata exists for it
    #[error("Repository '{name}' unavailable: {cause}")]
    RepositoryUnavailable { name: String, cause: String },

    /// No version assignment satisfies all constraints
    #[error("Unsatisfiable request: {0}")]
    Unsatisfiable(Explanation),

    /// A dependency cycle among newly installed packages with no installed
    /// version to break it
    #[error("Cyclic hard dependency among: {}", .0.join(" -> "))]
    CyclicHardDependency(Vec<String>),

    /// A staging step failed; the live system was not touched
    #[error("Staging failed for {step}: {cause}")]
    StagingFailed { step: String, cause: String },

    /// Downloaded blob does not match its declared checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Signature verification rejected a blob
    #[error("Signature invalid for package: {0}")]
    SignatureInvalid(String),

    /// Another transaction holds the lock
    #[error("Another transaction is already in progress")]
    TransactionInProgress,

    /// Cancellation was requested before the commit point
    #[error("Transaction cancelled before commit")]
    Cancelled,

    /// Journal replay could not restore a consistent state
    #[error("Commit interrupted; packages left inconsistent: {}", .packages.join(", "))]
    CommitInterrupted { packages: Vec<String> },

    /// Download or HTTP-level failure
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Malformed version, constraint, or metadata
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Requested package or record does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),
}

/// Result type alias using DPMS's Error type
pub type Result<T> = std::result::Result<T, Error>;
