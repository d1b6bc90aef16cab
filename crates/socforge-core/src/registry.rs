//! The core registry: search roots, discovery and identity lookup.
//!
//! Roots are kept in registration order. Registering a root scans it for
//! `.core` files and inserts every parsed descriptor into the lookup table,
//! replacing any earlier descriptor with the identical identity, so later
//! roots take precedence.
//!
//! The registry is not internally synchronized: callers serialize
//! `add_root` against lookups and resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core_file::{CoreDescriptor, CORE_FILE_EXTENSION};
use crate::error::{CoreError, Result};
use crate::vlnv::{Constraint, Vlnv};

/// A directory containing this file is skipped during scanning, with everything below it.
pub const IGNORE_MARKER: &str = "SOCFORGE_IGNORE";

#[derive(Debug, Clone)]
struct Registered {
    core: Arc<CoreDescriptor>,
    /// Global registration sequence number; higher registered later.
    seq: u64,
}

/// Registry of all cores discovered under the registered roots.
#[derive(Debug, Default)]
pub struct CoreRegistry {
    roots: Vec<PathBuf>,
    cores: BTreeMap<Vlnv, Registered>,
    next_seq: u64,
}

impl CoreRegistry {
    pub fn new() -> Self {
        CoreRegistry::default()
    }

    /// Register a search root and scan it for core files.
    ///
    /// Returns the number of cores registered from this root. Core files
    /// that fail to parse are skipped with a warning. Registering the same
    /// root twice is a no-op.
    pub fn add_root(&mut self, path: &Path) -> Result<usize> {
        if !path.is_dir() || std::fs::read_dir(path).is_err() {
            return Err(CoreError::RootNotFound {
                path: path.to_path_buf(),
            });
        }
        if self.roots.iter().any(|r| r == path) {
            debug!(root = %path.display(), "cores root already registered");
            return Ok(0);
        }

        debug!(root = %path.display(), "scanning cores root");
        let mut found = 0;
        for core_file in scan_core_files(path) {
            match CoreDescriptor::load(&core_file) {
                Ok(core) => {
                    self.insert(core);
                    found += 1;
                }
                Err(e) => warn!("skipping {}: {e}", core_file.display()),
            }
        }
        self.roots.push(path.to_path_buf());
        debug!(root = %path.display(), found, "registered cores root");
        Ok(found)
    }

    /// Register several roots in order, skipping unusable ones with a warning.
    ///
    /// Returns the total number of cores registered.
    pub fn add_roots<P: AsRef<Path>>(&mut self, roots: &[P]) -> usize {
        let mut total = 0;
        for root in roots {
            match self.add_root(root.as_ref()) {
                Ok(found) => total += found,
                Err(e) => warn!("{e}"),
            }
        }
        total
    }

    /// Insert a descriptor, replacing any earlier one with an equal identity.
    ///
    /// The key is replaced too, so listings show the newer spelling.
    pub fn insert(&mut self, core: CoreDescriptor) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let identity = core.identity.clone();
        let replaced = self.cores.remove(&identity);
        self.cores.insert(
            identity.clone(),
            Registered {
                core: Arc::new(core),
                seq,
            },
        );
        if let Some(previous) = replaced {
            debug!(
                core = %identity,
                previous = %previous.core.core_file.display(),
                "replacing earlier registration"
            );
        }
    }

    /// Find the best registered core matching `query` under partial-match rules.
    pub fn lookup(&self, query: &Vlnv) -> Result<Arc<CoreDescriptor>> {
        self.best(|candidate| query.matches(candidate))
            .ok_or_else(|| CoreError::CoreNotFound {
                query: query.to_string(),
            })
    }

    /// Find the best registered core admitted by a dependency constraint.
    pub fn lookup_constraint(&self, constraint: &Constraint) -> Option<Arc<CoreDescriptor>> {
        self.best(|candidate| constraint.admits(candidate))
    }

    /// Check whether any version of the constraint's core is registered.
    pub fn knows(&self, constraint: &Constraint) -> bool {
        self.cores.keys().any(|id| constraint.query().matches(id))
    }

    /// All registered identities, sorted.
    pub fn list_all(&self) -> Vec<Vlnv> {
        self.cores.keys().cloned().collect()
    }

    /// All registered descriptors, sorted by identity.
    pub fn cores(&self) -> impl Iterator<Item = &Arc<CoreDescriptor>> {
        self.cores.values().map(|r| &r.core)
    }

    /// Roots in registration order.
    pub fn get_roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Roots in lookup precedence order (most recently registered first).
    pub fn search_order(&self) -> Vec<&Path> {
        self.roots.iter().rev().map(PathBuf::as_path).collect()
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Highest version wins, then the most recent registration.
    fn best(&self, admit: impl Fn(&Vlnv) -> bool) -> Option<Arc<CoreDescriptor>> {
        self.cores
            .iter()
            .filter(|(id, _)| admit(id))
            .max_by(|(a, ra), (b, rb)| a.version().cmp(&b.version()).then(ra.seq.cmp(&rb.seq)))
            .map(|(_, r)| Arc::clone(&r.core))
    }
}

/// Collect core files under `root` in a stable order.
fn scan_core_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
            let ignored = entry.path().join(IGNORE_MARKER).exists();
            if ignored {
                debug!(dir = %entry.path().display(), "ignoring directory");
            }
            !hidden && !ignored
        });

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                let is_core = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == CORE_FILE_EXTENSION);
                if is_core {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("error while scanning {}: {e}", root.display()),
        }
    }
    files
}
