//! Provider descriptions and local cache status.
//!
//! A provider tells where a core's sources come from when they do not sit
//! next to the core file. Fetched sources live in the cache:
//!
//! ```text
//! <cache_root>/
//!   <sanitized core name>/
//!     ...materialized sources...
//! ```
//!
//! Fetching itself happens outside this crate; only the status is queried
//! here, and never during resolution.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core_file::CoreDescriptor;
use crate::vlnv::Vlnv;

/// Fetch mechanism of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Git,
    Url,
    Local,
    #[serde(other)]
    Unsupported,
}

/// Remote location and fetch mechanism of a core's sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: ProviderKind,
    /// Repository for `git` providers.
    #[serde(default)]
    pub repo: Option<String>,
    /// Download location for `url` providers.
    #[serde(default)]
    pub url: Option<String>,
    /// Revision, tag or archive version to fetch.
    #[serde(default)]
    pub version: Option<String>,
    /// Whether the sources are kept in the shared cache.
    #[serde(default = "default_cachable")]
    pub cachable: bool,
}

fn default_cachable() -> bool {
    true
}

impl Provider {
    /// Cache directory holding the sources of `identity`.
    pub fn cache_dir(&self, cache_root: &Path, identity: &Vlnv) -> PathBuf {
        cache_root.join(identity.sanitized_name())
    }

    /// Whether fetched sources land in the shared cache.
    pub fn fetches_into_cache(&self) -> bool {
        self.cachable && matches!(self.name, ProviderKind::Git | ProviderKind::Url)
    }

    /// The remote location, whichever field the provider kind uses.
    pub fn location(&self) -> Option<&str> {
        match self.name {
            ProviderKind::Git => self.repo.as_deref(),
            ProviderKind::Url => self.url.as_deref(),
            ProviderKind::Local | ProviderKind::Unsupported => None,
        }
    }
}

/// Whether a core's sources are materialized locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStatus {
    Fetched,
    NotFetched,
    Unknown,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStatus::Fetched => "fetched",
            CacheStatus::NotFetched => "not-fetched",
            CacheStatus::Unknown => "unknown",
        })
    }
}

impl CoreDescriptor {
    /// Report whether this core's sources are present.
    ///
    /// Cores without a provider keep their sources next to the core file
    /// and always count as fetched.
    pub fn cache_status(&self, cache_root: &Path) -> CacheStatus {
        let Some(provider) = &self.provider else {
            return CacheStatus::Fetched;
        };
        match provider.name {
            ProviderKind::Local => CacheStatus::Fetched,
            ProviderKind::Unsupported => CacheStatus::Unknown,
            ProviderKind::Git | ProviderKind::Url => {
                let dir = self.files_root(cache_root);
                match std::fs::read_dir(&dir) {
                    Ok(mut entries) => {
                        if entries.next().is_some() {
                            CacheStatus::Fetched
                        } else {
                            CacheStatus::NotFetched
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheStatus::NotFetched,
                    Err(_) => CacheStatus::Unknown,
                }
            }
        }
    }
}
