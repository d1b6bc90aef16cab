//! Materializing provider sources into the cache.

use std::path::Path;

use tracing::{debug, info};

use socforge_core::{CacheStatus, CoreDescriptor, ProviderKind};

use crate::error::{BackendError, Result};
use crate::launcher::Launcher;

/// Fetch the sources of `core` into its cache directory, if it has a
/// provider and they are not present yet.
///
/// Returns the cache status after the attempt.
pub fn setup(core: &CoreDescriptor, cache_root: &Path) -> Result<CacheStatus> {
    let name = core.identity.to_string();
    let Some(provider) = &core.provider else {
        return Ok(CacheStatus::Fetched);
    };
    let fail = |message: String| BackendError::Fetch {
        core: name.clone(),
        message,
    };

    match core.cache_status(cache_root) {
        CacheStatus::Fetched => {
            debug!(core = %name, "sources already present");
            return Ok(CacheStatus::Fetched);
        }
        CacheStatus::Unknown if provider.name == ProviderKind::Unsupported => {
            return Err(fail("unsupported provider".to_string()));
        }
        CacheStatus::Unknown | CacheStatus::NotFetched => {}
    }

    let location = provider
        .location()
        .ok_or_else(|| fail(format!("provider '{:?}' has no location", provider.name).to_lowercase()))?;
    let dest = core.files_root(cache_root);
    info!(core = %name, from = %location, "fetching sources");

    let result = match provider.name {
        ProviderKind::Git => fetch_git(location, provider.version.as_deref(), &dest),
        ProviderKind::Url => fetch_url(location, &dest),
        ProviderKind::Local | ProviderKind::Unsupported => Ok(()),
    };
    if let Err(e) = result {
        // Leave no half-populated directory that would read as fetched.
        let _ = std::fs::remove_dir_all(&dest);
        return Err(fail(e.to_string()));
    }
    Ok(core.cache_status(cache_root))
}

fn fetch_git(repo: &str, version: Option<&str>, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dest_str = dest.to_string_lossy();
    Launcher::new("git")
        .args(&["clone", "-q", repo, dest_str.as_ref()])
        .run()?;
    if let Some(version) = version {
        Launcher::new("git")
            .args(&["checkout", "-q", version])
            .cwd(dest)
            .run()?;
    }
    Ok(())
}

fn fetch_url(url: &str, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file_name = url
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download");
    let target = dest.join(file_name);
    let target_str = target.to_string_lossy();
    Launcher::new("curl")
        .args(&["-sSfL", "-o", target_str.as_ref(), url])
        .run()?;
    Ok(())
}
