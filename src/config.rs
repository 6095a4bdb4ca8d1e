// src/config.rs

//! On-disk layout for a DPMS installation
//!
//! All engine state lives under a single base directory: the installed
//! database, the metadata cache, the staging area, the transaction journal,
//! and the lock file. Installed files are deployed under a separate install
//! root so tests and alternate roots work without touching `/`.

use std::path::{Path, PathBuf};

/// Filesystem layout used by the engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding engine state (db, cache, staging, journal, lock)
    pub state_dir: PathBuf,
    /// Root under which package files are installed
    pub install_root: PathBuf,
    /// Maximum concurrent blob downloads during staging
    pub fetch_parallelism: usize,
    /// Solver backtrack budget before giving up as unsatisfiable
    pub solver_budget: u64,
}

impl Config {
    /// Layout with everything under `state_dir` and files deployed to
    /// `install_root`
    pub fn new(state_dir: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            install_root: install_root.into(),
            fetch_parallelism: 4,
            solver_budget: 100_000,
        }
    }

    /// Default system-wide layout
    pub fn system_default() -> Self {
        Self::new("/var/lib/dpms", "/")
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("dpms.db")
    }

    /// Last-known-good repository metadata, one JSON file per repository
    pub fn metadata_cache_dir(&self) -> PathBuf {
        self.state_dir.join("cache")
    }

    /// Temporary area where blobs are extracted before commit
    pub fn staging_dir(&self) -> PathBuf {
        self.state_dir.join("staging")
    }

    /// Write-ahead journal for the in-flight transaction
    pub fn journal_path(&self) -> PathBuf {
        self.state_dir.join("transaction.json")
    }

    /// Cross-process transaction lock
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("dpms.lock")
    }

    /// Configured repositories
    pub fn repos_path(&self) -> PathBuf {
        self.state_dir.join("repos.json")
    }

    /// Resolve an installed file path against the install root
    pub fn resolve_install_path(&self, relative: &str) -> PathBuf {
        self.install_root.join(relative.trim_start_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::system_default()
    }
}

/// True if `path` is lexically contained in `root` (no `..` escape)
pub fn path_is_contained(root: &Path, path: &Path) -> bool {
    use std::path::Component;

    let mut depth: i64 = 0;
    for component in path.strip_prefix(root).unwrap_or(path).components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let config = Config::new("/var/lib/dpms", "/");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/dpms/dpms.db"));
        assert_eq!(
            config.journal_path(),
            PathBuf::from("/var/lib/dpms/transaction.json")
        );
        assert_eq!(config.lock_path(), PathBuf::from("/var/lib/dpms/dpms.lock"));
    }

    #[test]
    fn test_resolve_install_path_strips_leading_slash() {
        let config = Config::new("/var/lib/dpms", "/opt/root");
        assert_eq!(
            config.resolve_install_path("/usr/bin/app"),
            PathBuf::from("/opt/root/usr/bin/app")
        );
        assert_eq!(
            config.resolve_install_path("usr/bin/app"),
            PathBuf::from("/opt/root/usr/bin/app")
        );
    }

    #[test]
    fn test_path_containment() {
        let root = Path::new("/opt/root");
        assert!(path_is_contained(root, Path::new("/opt/root/usr/bin")));
        assert!(!path_is_contained(root, Path::new("/opt/root/../etc")));
    }
}
