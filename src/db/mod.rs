// src/db/mod.rs

//! Installed-package database
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - Transaction handling
//! - CRUD operations for installed packages, files, and dependencies

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

pub mod models;
pub mod schema;

/// Initialize a new DPMS database at the specified path
///
/// Creates the database file and brings the schema up to date.
/// This is idempotent - calling it on an existing database is safe.
pub fn init(db_path: &Path) -> Result<Connection> {
    debug!("Initializing database at: {}", db_path.display());

    // Create parent directories if they don't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas for better performance and reliability
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    Ok(conn)
}

/// Open an existing DPMS database
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound(db_path.display().to_string()));
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    Ok(conn)
}

/// Run `f` inside a SQL transaction, committing on Ok and rolling back on Err
pub fn transaction<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
