// src/db/models.rs

//! Data models for installed-package database entities
//!
//! Rust structs corresponding to database tables, with methods for
//! creating, reading, and deleting records. Installed records are never
//! mutated in place - an upgrade removes the old record and inserts the
//! new one within the same transaction.

use crate::error::Result;
use crate::version::{VersionConstraint, parse_version};
use rusqlite::{Connection, OptionalExtension, Row, params};
use semver::Version;
use std::str::FromStr;

/// Kind of a declared dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Require,
    Optional,
    Conflict,
}

impl DependencyKind {
    pub fn as_str(&self) -> &str {
        match self {
            DependencyKind::Require => "require",
            DependencyKind::Optional => "optional",
            DependencyKind::Conflict => "conflict",
        }
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "require" => Ok(DependencyKind::Require),
            "optional" => Ok(DependencyKind::Optional),
            "conflict" => Ok(DependencyKind::Conflict),
            _ => Err(format!("Invalid dependency kind: {}", s)),
        }
    }
}

/// A declared requirement or conflict of an installed package
#[derive(Debug, Clone)]
pub struct DependencyEntry {
    pub id: Option<i64>,
    pub package_id: i64,
    pub dep_name: String,
    pub constraint: VersionConstraint,
    pub kind: DependencyKind,
}

impl DependencyEntry {
    pub fn new(
        package_id: i64,
        dep_name: String,
        constraint: VersionConstraint,
        kind: DependencyKind,
    ) -> Self {
        Self {
            id: None,
            package_id,
            dep_name,
            constraint,
            kind,
        }
    }

    /// Insert this dependency into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO dependencies (package_id, dep_name, version_constraint, kind)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.package_id,
                &self.dep_name,
                self.constraint.to_string(),
                self.kind.as_str(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all dependencies of a package
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, dep_name, version_constraint, kind
             FROM dependencies WHERE package_id = ?1",
        )?;

        let deps = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(deps)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let constraint_str: String = row.get(3)?;
        let constraint = constraint_str.parse::<VersionConstraint>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;
        let kind_str: String = row.get(4)?;
        let kind = kind_str.parse::<DependencyKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            dep_name: row.get(2)?,
            constraint,
            kind,
        })
    }
}

/// An installed package record
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    pub checksum: String,
    pub explicit: bool,
    pub installed_at: Option<String>,
}

impl InstalledPackage {
    pub fn new(name: String, version: Version, checksum: String) -> Self {
        Self {
            id: None,
            name,
            version,
            description: None,
            checksum,
            explicit: true,
            installed_at: None,
        }
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (name, version, description, checksum, explicit, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.name,
                self.version.to_string(),
                &self.description,
                &self.checksum,
                self.explicit,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an installed package by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, description, checksum, explicit, installed_at
             FROM packages WHERE name = ?1",
        )?;

        let package = stmt.query_row([name], Self::from_row).optional()?;

        Ok(package)
    }

    /// Find an installed package by rowid
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, description, checksum, explicit, installed_at
             FROM packages WHERE id = ?1",
        )?;

        let package = stmt.query_row([id], Self::from_row).optional()?;

        Ok(package)
    }

    /// List all installed packages, ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, description, checksum, explicit, installed_at
             FROM packages ORDER BY name",
        )?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Delete an installed package by name (files and dependencies cascade)
    pub fn delete_by_name(conn: &Connection, name: &str) -> Result<()> {
        conn.execute("DELETE FROM packages WHERE name = ?1", [name])?;
        Ok(())
    }

    /// Dependencies declared by this package
    pub fn dependencies(&self, conn: &Connection) -> Result<Vec<DependencyEntry>> {
        match self.id {
            Some(id) => DependencyEntry::find_by_package(conn, id),
            None => Ok(Vec::new()),
        }
    }

    /// Files owned by this package
    pub fn files(&self, conn: &Connection) -> Result<Vec<FileEntry>> {
        match self.id {
            Some(id) => FileEntry::find_by_package(conn, id),
            None => Ok(Vec::new()),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let version_str: String = row.get(2)?;
        let version = parse_version(&version_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version,
            description: row.get(3)?,
            checksum: row.get(4)?,
            explicit: row.get(5)?,
            installed_at: row.get(6)?,
        })
    }
}

/// A tracked file owned by an installed package
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: Option<i64>,
    pub path: String,
    pub sha256_hash: String,
    pub size: i64,
    pub package_id: i64,
}

impl FileEntry {
    pub fn new(path: String, sha256_hash: String, size: i64, package_id: i64) -> Self {
        Self {
            id: None,
            path,
            sha256_hash,
            size,
            package_id,
        }
    }

    /// Insert this file into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO files (path, sha256_hash, size, package_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![&self.path, &self.sha256_hash, self.size, self.package_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find the package owning a path, if any
    pub fn find_by_path(conn: &Connection, path: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, path, sha256_hash, size, package_id FROM files WHERE path = ?1",
        )?;

        let file = stmt.query_row([path], Self::from_row).optional()?;

        Ok(file)
    }

    /// Find all files belonging to a package
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, path, sha256_hash, size, package_id FROM files WHERE package_id = ?1",
        )?;

        let files = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            path: row.get(1)?,
            sha256_hash: row.get(2)?,
            size: row.get(3)?,
            package_id: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_package_insert_and_find() {
        let (_temp, conn) = create_test_db();

        let mut pkg = InstalledPackage::new(
            "nginx".to_string(),
            Version::new(1, 21, 0),
            "abc123".to_string(),
        );
        pkg.description = Some("HTTP server".to_string());
        pkg.insert(&conn).unwrap();

        let found = InstalledPackage::find_by_name(&conn, "nginx")
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "nginx");
        assert_eq!(found.version, Version::new(1, 21, 0));
        assert_eq!(found.description.as_deref(), Some("HTTP server"));
        assert!(found.explicit);
        assert!(found.installed_at.is_some());
    }

    #[test]
    fn test_package_delete_cascades() {
        let (_temp, conn) = create_test_db();

        let mut pkg = InstalledPackage::new(
            "app".to_string(),
            Version::new(1, 0, 0),
            "abc".to_string(),
        );
        let pkg_id = pkg.insert(&conn).unwrap();

        FileEntry::new("/usr/bin/app".to_string(), "h1".to_string(), 10, pkg_id)
            .insert(&conn)
            .unwrap();
        DependencyEntry::new(
            pkg_id,
            "lib".to_string(),
            ">=1.0".parse().unwrap(),
            DependencyKind::Require,
        )
        .insert(&conn)
        .unwrap();

        InstalledPackage::delete_by_name(&conn, "app").unwrap();

        assert!(FileEntry::find_by_path(&conn, "/usr/bin/app")
            .unwrap()
            .is_none());
        assert!(DependencyEntry::find_by_package(&conn, pkg_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dependency_roundtrip() {
        let (_temp, conn) = create_test_db();

        let mut pkg = InstalledPackage::new(
            "app".to_string(),
            Version::new(2, 1, 0),
            "abc".to_string(),
        );
        let pkg_id = pkg.insert(&conn).unwrap();

        DependencyEntry::new(
            pkg_id,
            "lib".to_string(),
            "^1.0".parse().unwrap(),
            DependencyKind::Require,
        )
        .insert(&conn)
        .unwrap();
        DependencyEntry::new(
            pkg_id,
            "legacy-lib".to_string(),
            "*".parse().unwrap(),
            DependencyKind::Conflict,
        )
        .insert(&conn)
        .unwrap();

        let deps = pkg.dependencies(&conn).unwrap();
        assert_eq!(deps.len(), 2);

        let require = deps
            .iter()
            .find(|d| d.kind == DependencyKind::Require)
            .unwrap();
        assert_eq!(require.dep_name, "lib");
        assert!(require.constraint.satisfies(&Version::new(1, 2, 0)));

        let conflict = deps
            .iter()
            .find(|d| d.kind == DependencyKind::Conflict)
            .unwrap();
        assert_eq!(conflict.dep_name, "legacy-lib");
    }

    #[test]
    fn test_list_all_ordered() {
        let (_temp, conn) = create_test_db();

        for name in ["zsh", "bash", "fish"] {
            InstalledPackage::new(name.to_string(), Version::new(1, 0, 0), "x".to_string())
                .insert(&conn)
                .unwrap();
        }

        let all = InstalledPackage::list_all(&conn).unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bash", "fish", "zsh"]);
    }
}
