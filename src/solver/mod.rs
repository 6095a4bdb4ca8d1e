// src/solver/mod.rs

//! Constraint solver
//!
//! Given the installed set and a request (install constraints, remove
//! names), computes a target set of exact package versions in which every
//! request is honored, every present package's dependencies are satisfied,
//! and no two present packages conflict - or reports `Unsatisfiable` with
//! a witness conflict.

pub mod engine;
pub mod explain;

pub use engine::solve;

use crate::repository::{PackageMeta, Requirement};
use crate::version::VersionConstraint;
use semver::Version;
use std::collections::BTreeMap;

/// Requested changes against the installed set
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub install: Vec<(String, VersionConstraint)>,
    pub remove: Vec<String>,
    /// Prefer newest candidates over keeping installed versions (upgrades)
    pub prefer_newest: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(mut self, name: impl Into<String>, constraint: VersionConstraint) -> Self {
        self.install.push((name.into(), constraint));
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.remove.push(name.into());
        self
    }

    pub fn prefer_newest(mut self) -> Self {
        self.prefer_newest = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty()
    }
}

/// Solver's view of one installed package, loaded from the database
#[derive(Debug, Clone)]
pub struct InstalledView {
    pub name: String,
    pub version: Version,
    pub depends: Vec<Requirement>,
    pub conflicts: Vec<Requirement>,
}

/// One member of a resolved target set
#[derive(Debug, Clone)]
pub enum TargetPackage {
    /// Stays at its installed version - no transaction step
    Keep(InstalledView),
    /// Newly chosen from a repository (install or upgrade)
    FromRepo(PackageMeta),
}

impl TargetPackage {
    pub fn name(&self) -> &str {
        match self {
            TargetPackage::Keep(view) => &view.name,
            TargetPackage::FromRepo(meta) => &meta.name,
        }
    }

    pub fn version(&self) -> &Version {
        match self {
            TargetPackage::Keep(view) => &view.version,
            TargetPackage::FromRepo(meta) => &meta.version,
        }
    }

    pub fn depends(&self) -> &[Requirement] {
        match self {
            TargetPackage::Keep(view) => &view.depends,
            TargetPackage::FromRepo(meta) => &meta.depends,
        }
    }

    pub fn conflicts(&self) -> &[Requirement] {
        match self {
            TargetPackage::Keep(view) => &view.conflicts,
            TargetPackage::FromRepo(meta) => &meta.conflicts,
        }
    }
}

/// Fully resolved set of exact package versions
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    pub packages: BTreeMap<String, TargetPackage>,
}

impl TargetSet {
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.packages.get(name).map(|p| p.version())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TargetPackage)> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
