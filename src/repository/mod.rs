// src/repository/mod.rs

//! Repository providers
//!
//! This module provides the metadata+blob contract the engine consumes:
//! - `RepositoryProvider`: list packages, fetch blobs, refresh metadata
//! - `HttpRepository`: remote index over HTTP with retry support
//! - `LocalRepository`: directory with an `index.json` and blob files
//!
//! A repository index is a JSON document naming each available package
//! version with its dependency strings, conflict strings, checksum, and
//! blob location.

use crate::error::{Error, Result};
use crate::version::{VersionConstraint, parse_requirement, parse_version};
use reqwest::blocking::Client;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// A dependency or conflict declared by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionConstraint,
    #[serde(default)]
    pub optional: bool,
}

/// A package version published by a repository. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    pub depends: Vec<Requirement>,
    pub conflicts: Vec<Requirement>,
    /// SHA-256 hex digest of the blob
    pub checksum: String,
    pub size: Option<u64>,
    /// Blob location: absolute URL or path relative to the repository
    pub blob: String,
    /// Name of the repository that published this package
    pub repository: String,
}

impl PackageMeta {
    pub fn ident(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Raw index entry as it appears in `index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub optional_depends: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    pub checksum: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub blob: String,
}

/// Repository index document
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexDocument {
    pub name: String,
    pub packages: Vec<IndexEntry>,
}

impl IndexEntry {
    /// Parse the raw strings of an index entry into a `PackageMeta`
    pub fn into_meta(self, repository: &str) -> Result<PackageMeta> {
        let version = parse_version(&self.version)?;

        let mut depends = Vec::new();
        for spec in &self.depends {
            let (name, constraint) = parse_requirement(spec)?;
            depends.push(Requirement {
                name,
                constraint,
                optional: false,
            });
        }
        for spec in &self.optional_depends {
            let (name, constraint) = parse_requirement(spec)?;
            depends.push(Requirement {
                name,
                constraint,
                optional: true,
            });
        }

        let mut conflicts = Vec::new();
        for spec in &self.conflicts {
            let (name, constraint) = parse_requirement(spec)?;
            conflicts.push(Requirement {
                name,
                constraint,
                optional: false,
            });
        }

        Ok(PackageMeta {
            name: self.name,
            version,
            description: self.description,
            depends,
            conflicts,
            checksum: self.checksum,
            size: self.size,
            blob: self.blob,
            repository: repository.to_string(),
        })
    }
}

/// One configured repository: a name and an HTTP URL or local directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    pub url: String,
}

impl RepoConfig {
    /// Build the provider this configuration describes
    pub fn into_provider(self) -> Result<Box<dyn RepositoryProvider>> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(Box::new(HttpRepository::new(self.name, self.url)?))
        } else {
            Ok(Box::new(LocalRepository::new(self.name, PathBuf::from(self.url))))
        }
    }
}

/// Load the configured repositories. A missing file means none are
/// configured yet.
pub fn load_providers(path: &Path) -> Result<Vec<Box<dyn RepositoryProvider>>> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let configs: Vec<RepoConfig> = serde_json::from_slice(&body)
        .map_err(|e| Error::ParseError(format!("Failed to parse {}: {}", path.display(), e)))?;
    configs.into_iter().map(RepoConfig::into_provider).collect()
}

/// Persist the repository configuration
pub fn save_repo_configs(path: &Path, configs: &[RepoConfig]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(configs)
        .map_err(|e| Error::ParseError(format!("Failed to serialize repositories: {}", e)))?;
    fs::write(path, body)?;
    Ok(())
}

/// Contract the engine consumes from a repository
pub trait RepositoryProvider: Send + Sync {
    /// Configured name of this repository
    fn name(&self) -> &str;

    /// All package versions this repository publishes
    fn list_packages(&self) -> Result<Vec<PackageMeta>>;

    /// Fetch the blob bytes for a package
    fn fetch_blob(&self, meta: &PackageMeta) -> Result<Vec<u8>>;

    /// Check the repository is reachable and its index parses
    fn refresh_metadata(&self) -> Result<()> {
        self.list_packages().map(|_| ())
    }
}

/// Remote repository: `index.json` plus blobs served over HTTP
pub struct HttpRepository {
    name: String,
    base_url: String,
    client: Client,
    max_retries: u32,
}

impl HttpRepository {
    pub fn new(name: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name,
            base_url,
            client,
            max_retries: MAX_RETRIES,
        })
    }

    fn index_url(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}index.json", self.base_url)
        } else {
            format!("{}/index.json", self.base_url)
        }
    }

    fn blob_url(&self, blob: &str) -> String {
        if blob.starts_with("http://") || blob.starts_with("https://") {
            blob.to_string()
        } else if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, blob)
        } else {
            format!("{}/{}", self.base_url, blob)
        }
    }

    /// GET with bounded retries, returning the response body
    fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    let bytes = response
                        .bytes()
                        .map_err(|e| Error::DownloadError(format!("Failed to read body: {}", e)))?;
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl RepositoryProvider for HttpRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_packages(&self) -> Result<Vec<PackageMeta>> {
        let url = self.index_url();
        info!("Fetching repository index from {}", url);

        let body = self.get_with_retry(&url)?;
        let document: IndexDocument = serde_json::from_slice(&body)
            .map_err(|e| Error::ParseError(format!("Failed to parse index JSON: {}", e)))?;

        info!(
            "Fetched index for {} packages from repository '{}'",
            document.packages.len(),
            self.name
        );

        document
            .packages
            .into_iter()
            .map(|entry| entry.into_meta(&self.name))
            .collect()
    }

    fn fetch_blob(&self, meta: &PackageMeta) -> Result<Vec<u8>> {
        let url = self.blob_url(&meta.blob);
        debug!("Downloading blob for {} from {}", meta.ident(), url);
        self.get_with_retry(&url)
    }
}

/// Local directory repository: `index.json` plus blob files beside it
pub struct LocalRepository {
    name: String,
    dir: PathBuf,
}

impl LocalRepository {
    pub fn new(name: String, dir: PathBuf) -> Self {
        Self { name, dir }
    }
}

impl RepositoryProvider for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_packages(&self) -> Result<Vec<PackageMeta>> {
        let index_path = self.dir.join("index.json");
        let body = fs::read(&index_path).map_err(|e| Error::RepositoryUnavailable {
            name: self.name.clone(),
            cause: format!("cannot read {}: {}", index_path.display(), e),
        })?;

        let document: IndexDocument = serde_json::from_slice(&body)
            .map_err(|e| Error::ParseError(format!("Failed to parse index JSON: {}", e)))?;

        document
            .packages
            .into_iter()
            .map(|entry| entry.into_meta(&self.name))
            .collect()
    }

    fn fetch_blob(&self, meta: &PackageMeta) -> Result<Vec<u8>> {
        let path = self.dir.join(&meta.blob);
        debug!("Reading blob for {} from {}", meta.ident(), path.display());
        fs::read(&path).map_err(|e| {
            Error::DownloadError(format!("cannot read blob {}: {}", path.display(), e))
        })
    }
}
