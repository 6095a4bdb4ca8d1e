// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Defines the SQLite schema for the installed-package database and
//! provides a migration system to evolve it over time.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    // Apply migrations in order
    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates the core tables:
/// - packages: installed package records (one version per name)
/// - files: file-level tracking with hashes (exclusive path ownership)
/// - dependencies: declared requirements and conflicts per package
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Installed packages: at most one version per name
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            version TEXT NOT NULL,
            description TEXT,
            checksum TEXT NOT NULL,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_packages_name ON packages(name);

        -- Files: every installed path is owned by exactly one package
        CREATE TABLE files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            sha256_hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            package_id INTEGER NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_files_path ON files(path);
        CREATE INDEX idx_files_package_id ON files(package_id);

        -- Dependencies: requirements and declared conflicts
        CREATE TABLE dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            dep_name TEXT NOT NULL,
            version_constraint TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('require', 'optional', 'conflict')),
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dependencies_package_id ON dependencies(package_id);
        CREATE INDEX idx_dependencies_dep_name ON dependencies(dep_name);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Add install-reason tracking
///
/// Marks whether a package was requested by the user or pulled in as a
/// dependency; upgrade-all derives its request set from explicit packages.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        ALTER TABLE packages ADD COLUMN explicit INTEGER NOT NULL DEFAULT 1;
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        // Initial version should be 0
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);

        set_schema_version(&conn, 1).unwrap();
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"packages".to_string()));
        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"dependencies".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        let version1 = get_schema_version(&conn).unwrap();

        migrate(&conn).unwrap();
        let version2 = get_schema_version(&conn).unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version1, SCHEMA_VERSION);
    }

    #[test]
    fn test_single_version_per_name_constraint() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO packages (name, version, checksum) VALUES (?1, ?2, ?3)",
            ["app", "1.0.0", "abc"],
        )
        .unwrap();

        // Second version of the same name must be rejected
        let result = conn.execute(
            "INSERT INTO packages (name, version, checksum) VALUES (?1, ?2, ?3)",
            ["app", "2.0.0", "def"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_exclusive_file_path_constraint() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO packages (name, version, checksum) VALUES ('a', '1.0.0', 'x')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO packages (name, version, checksum) VALUES ('b', '1.0.0', 'y')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO files (path, sha256_hash, size, package_id) VALUES ('/usr/bin/t', 'h', 1, 1)",
            [],
        )
        .unwrap();

        // Same path owned by a second package must be rejected
        let result = conn.execute(
            "INSERT INTO files (path, sha256_hash, size, package_id) VALUES ('/usr/bin/t', 'h', 1, 2)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dependency_kind_check() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO packages (name, version, checksum) VALUES ('a', '1.0.0', 'x')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO dependencies (package_id, dep_name, version_constraint, kind)
             VALUES (1, 'b', '*', 'bogus')",
            [],
        );
        assert!(result.is_err());
    }
}
