// src/engine.rs

//! Engine facade
//!
//! `PackageManager` ties the pieces together: it owns the database
//! connection, the configured repository providers, and the filesystem
//! layout, and exposes the resolve/plan/execute cycle the CLI drives.
//! Opening the engine replays any interrupted transaction before anything
//! else runs.

use crate::config::Config;
use crate::db;
use crate::db::models::{DependencyKind, InstalledPackage};
use crate::error::Result;
use crate::executor::{self, CancelToken, Executor, ProgressSink};
use crate::lock::LockGuard;
use crate::plan::{self, TransactionPlan};
use crate::repository::{Requirement, RepositoryProvider};
use crate::solver::{self, InstalledView, Request};
use crate::store::{MetadataStore, Warning};
use crate::verify::ChecksumVerifier;
use crate::version::VersionConstraint;
use rusqlite::Connection;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

pub struct PackageManager {
    config: Config,
    conn: Connection,
    providers: Vec<Box<dyn RepositoryProvider>>,
}

impl PackageManager {
    /// Create the state directory and database, or bring an existing one
    /// up to the current schema
    pub fn init(config: Config, providers: Vec<Box<dyn RepositoryProvider>>) -> Result<Self> {
        let conn = db::init(&config.db_path())?;
        info!("Initialized state at {}", config.state_dir.display());
        Ok(Self {
            config,
            conn,
            providers,
        })
    }

    /// Open an existing installation. Any transaction interrupted by a
    /// crash is finished or discarded here, before the engine serves
    /// queries.
    pub fn open(config: Config, providers: Vec<Box<dyn RepositoryProvider>>) -> Result<Self> {
        let mut conn = db::open(&config.db_path())?;
        {
            let _guard = LockGuard::acquire(&config.lock_path())?;
            executor::recover(&mut conn, &config)?;
        }
        Ok(Self {
            config,
            conn,
            providers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge all configured repositories into a metadata store, falling
    /// back to cached metadata for unreachable ones
    pub fn load_store(&self) -> Result<(MetadataStore, Vec<Warning>)> {
        MetadataStore::load(&self.providers, &self.config.metadata_cache_dir())
    }

    /// Resolve a request and order the result into a transaction plan.
    /// Nothing is modified; the plan can be shown, discarded, or executed.
    pub fn plan_transaction(
        &self,
        store: &MetadataStore,
        request: &Request,
    ) -> Result<TransactionPlan> {
        let installed = self.installed_views()?;
        let target = solver::solve(store, &installed, request, self.config.solver_budget)?;
        plan::plan(&installed, &target)
    }

    /// Run a plan under the transaction lock
    pub fn execute(
        &mut self,
        plan: &TransactionPlan,
        request: &Request,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<()> {
        let _guard = LockGuard::acquire(&self.config.lock_path())?;

        let requested: HashSet<&str> = request.install.iter().map(|(n, _)| n.as_str()).collect();
        let previously_explicit: HashSet<String> = InstalledPackage::list_all(&self.conn)?
            .into_iter()
            .filter(|p| p.explicit)
            .map(|p| p.name)
            .collect();

        let verifier = ChecksumVerifier;
        let executor = Executor::new(&self.config, &self.providers, &verifier);
        executor.execute(
            &mut self.conn,
            plan,
            |name| requested.contains(name) || previously_explicit.contains(name),
            sink,
            cancel,
        )
    }

    /// All installed packages, ordered by name
    pub fn installed(&self) -> Result<Vec<InstalledPackage>> {
        InstalledPackage::list_all(&self.conn)
    }

    pub fn find_installed(&self, name: &str) -> Result<Option<InstalledPackage>> {
        InstalledPackage::find_by_name(&self.conn, name)
    }

    /// Upgrade request: every explicitly installed package moves to its
    /// newest satisfying version; dependencies follow
    pub fn upgrade_request(&self) -> Result<Request> {
        let mut request = Request::new().prefer_newest();
        for pkg in self.installed()? {
            if pkg.explicit {
                request = request.install(pkg.name, VersionConstraint::any());
            }
        }
        Ok(request)
    }

    /// The solver's view of the installed set, dependencies included
    pub fn installed_views(&self) -> Result<BTreeMap<String, InstalledView>> {
        let mut views = BTreeMap::new();
        for pkg in self.installed()? {
            let mut depends = Vec::new();
            let mut conflicts = Vec::new();
            for dep in pkg.dependencies(&self.conn)? {
                let requirement = Requirement {
                    name: dep.dep_name,
                    constraint: dep.constraint,
                    optional: dep.kind == DependencyKind::Optional,
                };
                match dep.kind {
                    DependencyKind::Conflict => conflicts.push(requirement),
                    _ => depends.push(requirement),
                }
            }
            views.insert(
                pkg.name.clone(),
                InstalledView {
                    name: pkg.name,
                    version: pkg.version,
                    depends,
                    conflicts,
                },
            );
        }
        Ok(views)
    }
}
