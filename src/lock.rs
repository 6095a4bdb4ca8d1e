// src/lock.rs

//! Cross-process transaction lock
//!
//! A single advisory file lock guards the whole engine state directory.
//! The lock is held for the full span of a transaction and released when
//! the guard drops, including on panic or early return.

use crate::error::{Error, Result};
use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Holds the exclusive lock for the lifetime of a transaction
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    /// Take the exclusive lock, failing immediately if another process
    /// holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired transaction lock at {}", path.display());
                Ok(Self { file })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(Error::TransactionInProgress),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("Failed to release transaction lock: {}", e);
        }
    }
}
