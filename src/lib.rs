// src/lib.rs

//! DPMS Package Manager Core
//!
//! Dependency resolver and transaction engine: given install/remove/upgrade
//! requests against a set of repositories, computes a consistent target
//! package set and applies filesystem changes atomically with rollback on
//! failure.
//!
//! # Architecture
//!
//! - Metadata store: in-memory index merged from repository providers
//! - Solver: backtracking version-constraint search with conflict witnesses
//! - Planner: dependency-ordered install/remove/replace steps
//! - Executor: staged apply with write-ahead journal and crash recovery
//! - Installed DB: SQLite record of packages, files, and dependencies

pub mod config;
pub mod db;
pub mod engine;
mod error;
pub mod executor;
pub mod lock;
pub mod plan;
pub mod repository;
pub mod solver;
pub mod store;
pub mod verify;
pub mod version;

pub use config::Config;
pub use engine::PackageManager;
pub use error::{Error, Result};
