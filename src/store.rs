// src/store.rs

//! Package metadata store
//!
//! In-memory index of available package versions, built by merging all
//! configured repository providers at load time. Merge policy: union of
//! all (name, version) pairs; if the same pair appears from two providers,
//! the first-configured provider wins. A provider that cannot be reached
//! falls back to its last-known-good cache (surfaced as a warning); with
//! no cache, loading fails with `RepositoryUnavailable`.

use crate::error::{Error, Result};
use crate::repository::{PackageMeta, RepositoryProvider};
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Non-fatal condition surfaced to the caller during store load
#[derive(Debug, Clone)]
pub enum Warning {
    /// A repository was unreachable; its cached metadata was used instead
    StaleMetadata { repository: String, cause: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::StaleMetadata { repository, cause } => write!(
                f,
                "repository '{}' unreachable ({}); using cached metadata",
                repository, cause
            ),
        }
    }
}

/// Merged index of all available package versions
#[derive(Debug, Default)]
pub struct MetadataStore {
    /// name -> candidates sorted by version, descending
    packages: HashMap<String, Vec<PackageMeta>>,
}

impl MetadataStore {
    /// Build the store from providers, using `cache_dir` for
    /// last-known-good fallback
    pub fn load(
        providers: &[Box<dyn RepositoryProvider>],
        cache_dir: &Path,
    ) -> Result<(Self, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut merged: Vec<PackageMeta> = Vec::new();
        let mut seen: HashSet<(String, Version)> = HashSet::new();

        for provider in providers {
            let listed = match provider.list_packages() {
                Ok(packages) => {
                    write_cache(cache_dir, provider.name(), &packages);
                    packages
                }
                Err(e) => match read_cache(cache_dir, provider.name()) {
                    Some(cached) => {
                        let warning = Warning::StaleMetadata {
                            repository: provider.name().to_string(),
                            cause: e.to_string(),
                        };
                        warn!("{}", warning);
                        warnings.push(warning);
                        cached
                    }
                    None => {
                        return Err(Error::RepositoryUnavailable {
                            name: provider.name().to_string(),
                            cause: e.to_string(),
                        });
                    }
                },
            };

            // First-configured provider wins on duplicate (name, version)
            for meta in listed {
                let key = (meta.name.clone(), meta.version.clone());
                if seen.insert(key) {
                    merged.push(meta);
                } else {
                    debug!(
                        "Shadowed duplicate {} from repository '{}'",
                        meta.ident(),
                        provider.name()
                    );
                }
            }
        }

        let store = Self::from_packages(merged);
        info!(
            "Metadata store loaded: {} package names from {} providers",
            store.packages.len(),
            providers.len()
        );
        Ok((store, warnings))
    }

    /// Build a store directly from package metadata (tests, fixtures)
    pub fn from_packages(packages: impl IntoIterator<Item = PackageMeta>) -> Self {
        let mut map: HashMap<String, Vec<PackageMeta>> = HashMap::new();
        for meta in packages {
            map.entry(meta.name.clone()).or_default().push(meta);
        }
        for candidates in map.values_mut() {
            candidates.sort_by(|a, b| b.version.cmp(&a.version));
        }
        Self { packages: map }
    }

    /// Candidate versions for a name, newest first
    pub fn candidates(&self, name: &str) -> &[PackageMeta] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up an exact (name, version) pair
    pub fn get(&self, name: &str, version: &Version) -> Option<&PackageMeta> {
        self.candidates(name).iter().find(|m| &m.version == version)
    }

    /// Substring search over names and descriptions
    pub fn search(&self, pattern: &str) -> Vec<&PackageMeta> {
        let pattern = pattern.to_lowercase();
        let mut hits: Vec<&PackageMeta> = self
            .packages
            .values()
            .flatten()
            .filter(|m| {
                m.name.to_lowercase().contains(&pattern)
                    || m.description
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&pattern))
                        .unwrap_or(false)
            })
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(b.version.cmp(&a.version)));
        hits
    }

    /// All known package names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

fn cache_path(cache_dir: &Path, repository: &str) -> std::path::PathBuf {
    cache_dir.join(format!("{}.json", repository))
}

/// Persist a provider's listing as its last-known-good cache.
/// Cache write failures are logged, not fatal.
fn write_cache(cache_dir: &Path, repository: &str, packages: &[PackageMeta]) {
    if let Err(e) = fs::create_dir_all(cache_dir).and_then(|_| {
        let body = serde_json::to_vec_pretty(packages)?;
        fs::write(cache_path(cache_dir, repository), body)
    }) {
        warn!("Failed to write metadata cache for '{}': {}", repository, e);
    }
}

fn read_cache(cache_dir: &Path, repository: &str) -> Option<Vec<PackageMeta>> {
    let body = fs::read(cache_path(cache_dir, repository)).ok()?;
    match serde_json::from_slice(&body) {
        Ok(packages) => Some(packages),
        Err(e) => {
            warn!("Discarding corrupt metadata cache for '{}': {}", repository, e);
            None
        }
    }
}
