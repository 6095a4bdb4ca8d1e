// src/executor/mod.rs

//! Transaction executor
//!
//! Runs a planned transaction in two phases. Staging downloads, verifies,
//! and extracts every incoming blob into a scratch area without touching
//! the live system; any failure there discards the scratch area and leaves
//! everything untouched. Commit then applies steps in plan order, each one
//! a single database transaction paired with its file effects. A journal
//! written before each phase lets `recover` finish or discard an
//! interrupted transaction at the next startup.
//!
//! Blob fetches run on a bounded worker pool. Cancellation is honored up
//! to the commit point and ignored after it.

pub mod journal;

use crate::config::Config;
use crate::db;
use crate::db::models::{DependencyEntry, DependencyKind, FileEntry, InstalledPackage};
use crate::error::{Error, Result};
use crate::plan::TransactionPlan;
use crate::repository::{PackageMeta, RepositoryProvider};
use crate::verify::{Verifier, sha256_hex};
use flate2::read::GzDecoder;
use journal::{Journal, JournalPhase, JournalStep};
use rayon::prelude::*;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications emitted while a transaction runs
#[derive(Debug, Clone)]
pub enum ExecuteEvent {
    /// A blob fetch and extraction began
    Staging { package: String },
    /// A blob was verified and extracted
    Staged { package: String },
    /// A step is being applied to the live system
    Committing { step: String },
    /// All steps applied, journal cleared
    Committed,
    /// Staging failed or was cancelled; nothing was changed
    RolledBack,
}

/// Receiver for progress events. May be called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ExecuteEvent);
}

/// Sink that drops all events
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&self, _event: &ExecuteEvent) {}
}

/// One extracted file in the staging area, path rooted at `/`
#[derive(Debug, Clone)]
struct StagedFile {
    path: String,
    hash: String,
    size: i64,
}

/// An extracted package awaiting commit
#[derive(Debug)]
struct StagedPackage {
    dir: PathBuf,
    files: Vec<StagedFile>,
}

/// Applies planned transactions against a database and install root
pub struct Executor<'a> {
    config: &'a Config,
    providers: &'a [Box<dyn RepositoryProvider>],
    verifier: &'a dyn Verifier,
}

impl<'a> Executor<'a> {
    pub fn new(
        config: &'a Config,
        providers: &'a [Box<dyn RepositoryProvider>],
        verifier: &'a dyn Verifier,
    ) -> Self {
        Self {
            config,
            providers,
            verifier,
        }
    }

    /// Run a plan to completion. `is_explicit` marks which installed rows
    /// record a direct user request rather than a dependency pull-in.
    pub fn execute(
        &self,
        conn: &mut Connection,
        plan: &TransactionPlan,
        is_explicit: impl Fn(&str) -> bool,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        if plan.is_empty() {
            debug!("Empty plan, nothing to execute");
            return Ok(());
        }

        let journal_path = self.config.journal_path();
        let mut journal = Journal::from_plan(plan, is_explicit);
        journal.write(&journal_path)?;

        let staged = match self.stage(conn, &journal, sink, cancel) {
            Ok(staged) => staged,
            Err(e) => {
                discard_staging_dir(self.config);
                Journal::clear(&journal_path)?;
                sink.on_event(&ExecuteEvent::RolledBack);
                return Err(e);
            }
        };

        journal.phase = JournalPhase::Committing;
        journal.write(&journal_path)?;

        for step in &journal.steps {
            // Cancellation lands between steps only; the current step
            // always finishes. The journal and staged data stay in place
            // so startup recovery replays the rest, same as a crash.
            if cancel.is_cancelled() {
                warn!("Transaction cancelled mid-commit; remaining steps deferred to recovery");
                return Err(Error::Cancelled);
            }
            sink.on_event(&ExecuteEvent::Committing {
                step: describe(step),
            });
            self.commit_step(conn, step, &staged)?;
        }

        Journal::clear(&journal_path)?;
        discard_staging_dir(self.config);
        sink.on_event(&ExecuteEvent::Committed);
        info!("Transaction committed: {} step(s)", journal.steps.len());
        Ok(())
    }

    /// Fetch, verify, and extract every incoming blob. The live system is
    /// not touched; errors here are fully recoverable.
    fn stage(
        &self,
        conn: &Connection,
        journal: &Journal,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, StagedPackage>> {
        let staging_dir = self.config.staging_dir();
        discard_staging_dir(self.config);
        fs::create_dir_all(&staging_dir)?;

        let incoming: Vec<&PackageMeta> = journal
            .steps
            .iter()
            .filter_map(|step| match step {
                JournalStep::Install { meta, .. } => Some(meta),
                JournalStep::Replace { new, .. } => Some(new),
                JournalStep::Remove { .. } => None,
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.fetch_parallelism.max(1))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to build fetch pool: {}", e)))?;

        let staged_list: Vec<(String, StagedPackage)> = pool.install(|| {
            incoming
                .into_par_iter()
                .map(|meta| {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    sink.on_event(&ExecuteEvent::Staging {
                        package: meta.ident(),
                    });
                    let staged = self.stage_one(meta)?;
                    sink.on_event(&ExecuteEvent::Staged {
                        package: meta.ident(),
                    });
                    Ok((meta.ident(), staged))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let staged: HashMap<String, StagedPackage> = staged_list.into_iter().collect();

        self.check_exclusive_paths(conn, journal, &staged)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(staged)
    }

    fn stage_one(&self, meta: &PackageMeta) -> Result<StagedPackage> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.name() == meta.repository)
            .ok_or_else(|| Error::RepositoryUnavailable {
                name: meta.repository.clone(),
                cause: "provider not configured".to_string(),
            })?;

        let blob = provider.fetch_blob(meta)?;
        self.verifier.verify(meta, &blob)?;

        let dest = self.config.staging_dir().join(meta.ident());
        fs::create_dir_all(&dest)?;
        extract_blob(&meta.blob, &blob, &dest).map_err(|e| match e {
            Error::StagingFailed { .. } => e,
            other => Error::StagingFailed {
                step: meta.ident(),
                cause: other.to_string(),
            },
        })?;

        let files = collect_files(&dest)?;
        debug!("Staged {} ({} files)", meta.ident(), files.len());
        Ok(StagedPackage { dir: dest, files })
    }

    /// Every staged path must be unowned, owned by the same package name,
    /// or owned by a package this transaction removes.
    fn check_exclusive_paths(
        &self,
        conn: &Connection,
        journal: &Journal,
        staged: &HashMap<String, StagedPackage>,
    ) -> Result<()> {
        let outgoing: HashSet<&str> = journal
            .steps
            .iter()
            .filter_map(|step| match step {
                JournalStep::Remove { name, .. } => Some(name.as_str()),
                JournalStep::Replace { new, .. } => Some(new.name.as_str()),
                JournalStep::Install { .. } => None,
            })
            .collect();

        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for step in &journal.steps {
            let meta = match step {
                JournalStep::Install { meta, .. } => meta,
                JournalStep::Replace { new, .. } => new,
                JournalStep::Remove { .. } => continue,
            };
            let Some(pkg) = staged.get(&meta.ident()) else {
                continue;
            };

            for file in &pkg.files {
                // Two incoming packages shipping one path
                if let Some(other) = claimed.insert(file.path.as_str(), meta.name.as_str()) {
                    if other != meta.name {
                        return Err(Error::StagingFailed {
                            step: meta.ident(),
                            cause: format!("file {} also shipped by {}", file.path, other),
                        });
                    }
                }

                // An installed package outside this transaction owning it
                if let Some(entry) = FileEntry::find_by_path(conn, &file.path)? {
                    if let Some(owner) = InstalledPackage::find_by_id(conn, entry.package_id)? {
                        if owner.name != meta.name && !outgoing.contains(owner.name.as_str()) {
                            return Err(Error::StagingFailed {
                                step: meta.ident(),
                                cause: format!(
                                    "file {} already owned by {}-{}",
                                    file.path, owner.name, owner.version
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply one step: its file effects and database writes succeed or
    /// roll back together.
    fn commit_step(
        &self,
        conn: &mut Connection,
        step: &JournalStep,
        staged: &HashMap<String, StagedPackage>,
    ) -> Result<()> {
        match step {
            JournalStep::Remove { name, .. } => {
                db::transaction(conn, |tx| apply_remove(tx, self.config, name))
            }
            JournalStep::Install { meta, explicit } => {
                let pkg = require_staged(staged, meta)?;
                db::transaction(conn, |tx| {
                    apply_install(tx, self.config, meta, *explicit, pkg)
                })
            }
            JournalStep::Replace { new, explicit, .. } => {
                let pkg = require_staged(staged, new)?;
                db::transaction(conn, |tx| {
                    apply_replace(tx, self.config, new, *explicit, pkg)
                })
            }
        }
    }
}

/// Finish or discard an interrupted transaction found at startup.
///
/// A journal in the staging phase means nothing live changed: discard it.
/// A journal in the committing phase is replayed: steps the database
/// already reflects are skipped, the rest are applied from the surviving
/// staging area. Installs whose staged files are gone cannot be finished
/// and are reported as `CommitInterrupted`.
pub fn recover(conn: &mut Connection, config: &Config) -> Result<()> {
    let journal_path = config.journal_path();
    let Some(journal) = Journal::load(&journal_path)? else {
        return Ok(());
    };

    match journal.phase {
        JournalPhase::Staging => {
            info!("Discarding transaction abandoned during staging");
            discard_staging_dir(config);
            Journal::clear(&journal_path)?;
        }
        JournalPhase::Committing => {
            info!(
                "Replaying interrupted transaction ({} step(s))",
                journal.steps.len()
            );
            replay(conn, config, &journal)?;
            Journal::clear(&journal_path)?;
            discard_staging_dir(config);
        }
    }
    Ok(())
}

fn replay(conn: &mut Connection, config: &Config, journal: &Journal) -> Result<()> {
    let mut unfinished = Vec::new();

    for step in &journal.steps {
        if step_applied(conn, step)? {
            debug!("Replay: step already applied: {}", describe(step));
            continue;
        }

        match step {
            JournalStep::Remove { name, .. } => {
                db::transaction(conn, |tx| apply_remove(tx, config, name))?;
            }
            JournalStep::Install { meta, explicit } => {
                match load_staged(config, meta)? {
                    Some(pkg) => db::transaction(conn, |tx| {
                        apply_install(tx, config, meta, *explicit, &pkg)
                    })?,
                    None => unfinished.push(meta.ident()),
                }
            }
            JournalStep::Replace { new, explicit, .. } => match load_staged(config, new)? {
                Some(pkg) => db::transaction(conn, |tx| {
                    apply_replace(tx, config, new, *explicit, &pkg)
                })?,
                None => unfinished.push(new.ident()),
            },
        }
    }

    if !unfinished.is_empty() {
        return Err(Error::CommitInterrupted {
            packages: unfinished,
        });
    }
    Ok(())
}

/// True if the database already reflects this step's outcome
fn step_applied(conn: &Connection, step: &JournalStep) -> Result<bool> {
    Ok(match step {
        JournalStep::Install { meta, .. } => {
            matches!(InstalledPackage::find_by_name(conn, &meta.name)?,
                Some(row) if row.version == meta.version)
        }
        JournalStep::Remove { name, version } => {
            !matches!(InstalledPackage::find_by_name(conn, name)?,
                Some(row) if row.version == *version)
        }
        JournalStep::Replace { new, .. } => {
            matches!(InstalledPackage::find_by_name(conn, &new.name)?,
                Some(row) if row.version == new.version)
        }
    })
}

/// Rebuild a `StagedPackage` from a surviving staging directory
fn load_staged(config: &Config, meta: &PackageMeta) -> Result<Option<StagedPackage>> {
    let dir = config.staging_dir().join(meta.ident());
    if !dir.is_dir() {
        return Ok(None);
    }
    let files = collect_files(&dir)?;
    Ok(Some(StagedPackage { dir, files }))
}

fn require_staged<'s>(
    staged: &'s HashMap<String, StagedPackage>,
    meta: &PackageMeta,
) -> Result<&'s StagedPackage> {
    staged.get(&meta.ident()).ok_or_else(|| Error::StagingFailed {
        step: meta.ident(),
        cause: "staged files missing".to_string(),
    })
}

fn describe(step: &JournalStep) -> String {
    match step {
        JournalStep::Install { meta, .. } => format!("install {}", meta.ident()),
        JournalStep::Remove { name, version } => format!("remove {}-{}", name, version),
        JournalStep::Replace {
            old_version, new, ..
        } => format!("replace {}-{} with {}", new.name, old_version, new.ident()),
    }
}

fn apply_remove(tx: &Connection, config: &Config, name: &str) -> Result<()> {
    let Some(installed) = InstalledPackage::find_by_name(tx, name)? else {
        return Ok(());
    };
    for file in installed.files(tx)? {
        remove_deployed(&config.resolve_install_path(&file.path))?;
    }
    InstalledPackage::delete_by_name(tx, name)?;
    debug!("Removed {}-{}", installed.name, installed.version);
    Ok(())
}

fn apply_install(
    tx: &Connection,
    config: &Config,
    meta: &PackageMeta,
    explicit: bool,
    pkg: &StagedPackage,
) -> Result<()> {
    for file in &pkg.files {
        let source = pkg.dir.join(file.path.trim_start_matches('/'));
        let target = config.resolve_install_path(&file.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target)?;
    }

    let mut row = InstalledPackage::new(meta.name.clone(), meta.version.clone(), meta.checksum.clone());
    row.description = meta.description.clone();
    row.explicit = explicit;
    let pkg_id = row.insert(tx)?;

    for file in &pkg.files {
        FileEntry::new(file.path.clone(), file.hash.clone(), file.size, pkg_id).insert(tx)?;
    }
    for dep in &meta.depends {
        let kind = if dep.optional {
            DependencyKind::Optional
        } else {
            DependencyKind::Require
        };
        DependencyEntry::new(pkg_id, dep.name.clone(), dep.constraint.clone(), kind).insert(tx)?;
    }
    for conflict in &meta.conflicts {
        DependencyEntry::new(
            pkg_id,
            conflict.name.clone(),
            conflict.constraint.clone(),
            DependencyKind::Conflict,
        )
        .insert(tx)?;
    }

    debug!("Installed {}", meta.ident());
    Ok(())
}

/// New files are deployed before the old record is dropped, so the
/// package's paths are never absent from disk mid-step.
fn apply_replace(
    tx: &Connection,
    config: &Config,
    new: &PackageMeta,
    explicit: bool,
    pkg: &StagedPackage,
) -> Result<()> {
    let old_files = match InstalledPackage::find_by_name(tx, &new.name)? {
        Some(old) => old.files(tx)?,
        None => Vec::new(),
    };

    InstalledPackage::delete_by_name(tx, &new.name)?;
    apply_install(tx, config, new, explicit, pkg)?;

    // Paths the new version no longer ships
    let new_paths: HashSet<&str> = pkg.files.iter().map(|f| f.path.as_str()).collect();
    for file in &old_files {
        if !new_paths.contains(file.path.as_str()) {
            remove_deployed(&config.resolve_install_path(&file.path))?;
        }
    }
    Ok(())
}

fn remove_deployed(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Deployed file already missing: {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn discard_staging_dir(config: &Config) {
    let dir = config.staging_dir();
    if let Err(e) = fs::remove_dir_all(&dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to clean staging dir {}: {}", dir.display(), e);
        }
    }
}

fn extract_blob(blob_name: &str, bytes: &[u8], dest: &Path) -> Result<()> {
    if blob_name.ends_with(".tar.gz") || blob_name.ends_with(".tgz") {
        unpack(tar::Archive::new(GzDecoder::new(bytes)), dest)
    } else if blob_name.ends_with(".tar.xz") {
        unpack(tar::Archive::new(XzDecoder::new(bytes)), dest)
    } else {
        Err(Error::ParseError(format!(
            "Unsupported blob format: {}",
            blob_name
        )))
    }
}

fn unpack<R: Read>(mut archive: tar::Archive<R>, dest: &Path) -> Result<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.unpack_in(dest)? {
            let path = entry.path()?.display().to_string();
            return Err(Error::StagingFailed {
                step: dest.display().to_string(),
                cause: format!("archive entry escapes staging area: {}", path),
            });
        }
    }
    Ok(())
}

/// Walk an extracted tree and list its regular files, paths rooted at `/`
fn collect_files(root: &Path) -> Result<Vec<StagedFile>> {
    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                dirs.push(path);
            } else if file_type.is_file() {
                let bytes = fs::read(&path)?;
                let rel = path.strip_prefix(root).map_err(|_| {
                    Error::InitError(format!("Staged file outside its root: {}", path.display()))
                })?;
                files.push(StagedFile {
                    path: format!("/{}", rel.display()),
                    hash: sha256_hex(&bytes),
                    size: bytes.len() as i64,
                });
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
