//! `socforge fetch`: materialize a core's provider sources.

use anyhow::{Context, Result};

use crate::session::Session;

/// Run `socforge fetch <core>`.
pub fn run(session: &Session, name: &str) -> Result<()> {
    let core = session.core(name)?;
    let status = socforge_backend::setup(&core, &session.settings.cache_root)
        .with_context(|| format!("fetching {}", core.identity))?;
    println!("{}: {status}", core.identity);
    Ok(())
}
