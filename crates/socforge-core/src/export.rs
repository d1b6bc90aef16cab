//! Copying a descriptor's sources into a self-contained export tree.
//!
//! ```text
//! <export_root>/
//!   <sanitized core name>/
//!     <declared relative path>
//! ```
//!
//! The returned descriptor points at the copies, so a work root built from
//! it does not depend on the cores roots or the cache.

use std::path::{Component, Path};

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::synth::{BuildDescriptor, FileRecord};

/// Copy every file of `descriptor` below `export_root`.
///
/// A file listed twice is copied once. Declared paths must stay inside
/// their core's directory.
pub fn export_files(descriptor: &BuildDescriptor, export_root: &Path) -> Result<BuildDescriptor> {
    let mut exported = descriptor.clone();
    for record in &mut exported.files {
        check_relative(record)?;
        let core_dir = export_root.join(record.core.sanitized_name());
        let src = record.full_path();
        let dst = core_dir.join(&record.path);
        if !dst.exists() {
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&src, &dst).map_err(|e| CoreError::Export {
                path: src.clone(),
                detail: e.to_string(),
            })?;
        }
        record.root = core_dir;
    }
    debug!(
        files = exported.files.len(),
        root = %export_root.display(),
        "exported sources"
    );
    Ok(exported)
}

fn check_relative(record: &FileRecord) -> Result<()> {
    let escapes = record
        .path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CoreError::Export {
            path: record.full_path(),
            detail: "path leaves the core directory".to_string(),
        });
    }
    Ok(())
}
