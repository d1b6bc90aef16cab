//! Listing commands: list-paths, list-cores, list-systems.

use anyhow::{bail, Result};

use crate::session::Session;

/// Flow whose target marks a core as a buildable system.
const SYSTEM_FLOW: &str = "synth";

/// Run `socforge list-paths`.
pub fn list_paths(session: &Session) -> Result<()> {
    print!("{}", render_paths(session));
    Ok(())
}

/// Run `socforge list-cores`.
pub fn list_cores(session: &Session) -> Result<()> {
    print!("{}", render_cores(session)?);
    Ok(())
}

/// Run `socforge list-systems`.
pub fn list_systems(session: &Session) -> Result<()> {
    print!("{}", render_systems(session));
    Ok(())
}

/// Roots in search order, highest precedence first.
pub fn render_paths(session: &Session) -> String {
    session
        .registry
        .search_order()
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect()
}

pub fn render_cores(session: &Session) -> Result<String> {
    if session.registry.is_empty() {
        bail!("no cores found in any library");
    }
    let cache_root = &session.settings.cache_root;
    let rows: Vec<(String, String)> = session
        .registry
        .cores()
        .map(|core| (core.identity.to_string(), core.cache_status(cache_root).to_string()))
        .collect();
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0).max(4);

    let mut out = String::from("Available cores:\n\n");
    out.push_str(&format!("{:<width$}   Cache status\n", "Core"));
    out.push_str(&format!("{}\n", "=".repeat(width + 15)));
    for (name, status) in rows {
        out.push_str(&format!("{name:<width$} : {status}\n"));
    }
    Ok(out)
}

/// Cores whose `synth` target names a default tool.
pub fn render_systems(session: &Session) -> String {
    session
        .registry
        .cores()
        .filter(|core| {
            core.targets
                .get(SYSTEM_FLOW)
                .is_some_and(|t| t.default_tool.is_some())
        })
        .map(|core| format!("{}\n", core.identity))
        .collect()
}
