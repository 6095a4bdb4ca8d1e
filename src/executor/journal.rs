// src/executor/journal.rs

//! Transaction journal
//!
//! A small JSON document written beside the database before the executor
//! touches anything. The `phase` field records how far the transaction got:
//! `staging` means no live file or database row has changed yet, so recovery
//! just discards the staging area; `committing` means step effects may be
//! partially applied, so recovery replays the steps the database does not
//! yet reflect. Writes are atomic (temp file then rename).

use crate::error::{Error, Result};
use crate::plan::{Step, TransactionPlan};
use crate::repository::PackageMeta;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// How far the journaled transaction progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalPhase {
    Staging,
    Committing,
}

/// One journaled step. Install and replace embed the full package metadata
/// so recovery can rebuild database rows without the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JournalStep {
    Install {
        meta: PackageMeta,
        explicit: bool,
    },
    Remove {
        name: String,
        version: Version,
    },
    Replace {
        old_version: Version,
        new: PackageMeta,
        explicit: bool,
    },
}

impl JournalStep {
    pub fn name(&self) -> &str {
        match self {
            JournalStep::Install { meta, .. } => &meta.name,
            JournalStep::Remove { name, .. } => name,
            JournalStep::Replace { new, .. } => &new.name,
        }
    }
}

/// The persisted transaction record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub phase: JournalPhase,
    pub steps: Vec<JournalStep>,
}

impl Journal {
    /// Journal a plan in the staging phase. `is_explicit` marks which
    /// installed rows should carry the explicit flag.
    pub fn from_plan(plan: &TransactionPlan, is_explicit: impl Fn(&str) -> bool) -> Self {
        let steps = plan
            .steps
            .iter()
            .map(|step| match step {
                Step::Install(meta) => JournalStep::Install {
                    meta: meta.clone(),
                    explicit: is_explicit(&meta.name),
                },
                Step::Remove { name, version } => JournalStep::Remove {
                    name: name.clone(),
                    version: version.clone(),
                },
                Step::Replace { old_version, new } => JournalStep::Replace {
                    old_version: old_version.clone(),
                    new: new.clone(),
                    explicit: is_explicit(&new.name),
                },
            })
            .collect();

        Self {
            phase: JournalPhase::Staging,
            steps,
        }
    }

    /// Atomically persist the journal (temp file then rename)
    pub fn write(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::InitError(format!("Failed to serialize journal: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, path)?;

        debug!("Journal written at {} ({:?})", path.display(), self.phase);
        Ok(())
    }

    /// Load the journal if one exists. A corrupt journal is treated as
    /// absent: nothing trustworthy can be replayed from it.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let body = match fs::read(path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&body) {
            Ok(journal) => Ok(Some(journal)),
            Err(e) => {
                warn!("Discarding corrupt journal at {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Remove the journal after a completed or abandoned transaction
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_plan() -> TransactionPlan {
        TransactionPlan {
            steps: vec![
                Step::Remove {
                    name: "old-tool".to_string(),
                    version: Version::new(1, 0, 0),
                },
                Step::Install(crate::store::tests::meta("lib", "1.2", "main")),
            ],
        }
    }

    #[test]
    fn test_journal_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transaction.json");

        let mut journal = Journal::from_plan(&sample_plan(), |name| name == "lib");
        journal.write(&path).unwrap();
        journal.phase = JournalPhase::Committing;
        journal.write(&path).unwrap();

        let loaded = Journal::load(&path).unwrap().unwrap();
        assert_eq!(loaded.phase, JournalPhase::Committing);
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.steps[0].name(), "old-tool");
        let JournalStep::Install { explicit, .. } = &loaded.steps[1] else {
            panic!("expected install step");
        };
        assert!(explicit);
    }

    #[test]
    fn test_missing_journal_loads_as_none() {
        let dir = tempdir().unwrap();
        assert!(Journal::load(&dir.path().join("transaction.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_journal_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transaction.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(Journal::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transaction.json");

        Journal::from_plan(&sample_plan(), |_| true)
            .write(&path)
            .unwrap();
        Journal::clear(&path).unwrap();
        Journal::clear(&path).unwrap();
        assert!(!path.exists());
    }
}
