//! Flow commands: build, pgm, sim and run.
//!
//! Every flow resolves the system's closure, fetches missing sources,
//! synthesizes a build descriptor and drives a backend through the
//! requested stages in
//! `<build_root>/<sanitized name>/<sim|bld>-<tool>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use socforge_backend::{BackendContext, BackendRegistry};
use socforge_core::{export_files, resolve, synthesize, CacheStatus, ResolvedClosure, Selection, Settings};

use crate::session::Session;

/// Stages of a flow to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub setup: bool,
    pub build: bool,
    pub run: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        setup: true,
        build: true,
        run: true,
    };

    /// The stages named on the command line, or all of them when none is.
    pub fn select(setup: bool, build: bool, run: bool) -> Self {
        if setup || build || run {
            Stages { setup, build, run }
        } else {
            Stages::ALL
        }
    }
}

/// One flow invocation.
#[derive(Debug, Clone)]
pub struct FlowRequest<'a> {
    pub system: &'a str,
    pub flow: &'a str,
    pub tool: Option<&'a str>,
    pub target: Option<&'a str>,
    pub flags: &'a [String],
    pub stages: Stages,
    pub export: bool,
    /// Reuse an existing work root without setting it up or building again.
    pub keep: bool,
    pub backend_args: &'a [String],
}

impl<'a> FlowRequest<'a> {
    pub fn new(system: &'a str, flow: &'a str) -> Self {
        FlowRequest {
            system,
            flow,
            tool: None,
            target: None,
            flags: &[],
            stages: Stages::ALL,
            export: true,
            keep: false,
            backend_args: &[],
        }
    }
}

/// Run a flow, returning the work root used.
pub fn run(session: &Session, backends: &BackendRegistry, req: &FlowRequest<'_>) -> Result<PathBuf> {
    let root = session.core(req.system)?;
    let mut selection = Selection::new(req.flow).with_flags(req.flags.iter().collect());
    if let Some(target) = req.target {
        selection = selection.with_target(target);
    }

    let closure = resolve(&session.registry, &root.identity, &selection)
        .with_context(|| format!("resolving {} for '{}'", root.identity, req.flow))?;
    fetch_missing(&closure, &session.settings)?;

    let descriptor = synthesize(&closure, req.tool, &session.settings)
        .with_context(|| format!("preparing {} for '{}'", closure.root, req.flow))?;

    let system_dir = session.settings.build_root.join(closure.root.sanitized_name());
    let prefix = if req.flow == "sim" { "sim" } else { "bld" };
    let work_root = system_dir.join(format!("{prefix}-{}", descriptor.tool));

    let descriptor = if req.export {
        let export_root = system_dir.join("src");
        if export_root.exists() {
            std::fs::remove_dir_all(&export_root)
                .with_context(|| format!("clearing {}", export_root.display()))?;
        }
        export_files(&descriptor, &export_root)?
    } else {
        descriptor
    };

    let kept = req.keep && work_root.is_dir();
    let tool = descriptor.tool.clone();
    let mut backend = backends.for_tool(BackendContext {
        descriptor,
        work_root: work_root.clone(),
        settings: session.settings.clone(),
    })?;

    if kept {
        info!(work_root = %work_root.display(), "keeping existing work root");
    } else {
        if req.stages.setup {
            info!("setting up {} for {tool} in {}", closure.root, work_root.display());
            backend.configure(req.backend_args)?;
        }
        if req.stages.build {
            info!("building {} with {tool}", closure.root);
            backend.build()?;
        }
    }
    if req.stages.run {
        info!("running {} with {tool}", closure.root);
        backend.run(req.backend_args)?;
    }
    Ok(work_root)
}

/// Fetch provider sources for every core of the closure that lacks them.
fn fetch_missing(closure: &ResolvedClosure, settings: &Settings) -> Result<()> {
    for entry in &closure.cores {
        let core = &entry.core;
        if core.cache_status(&settings.cache_root) == CacheStatus::NotFetched {
            socforge_backend::setup(core, &settings.cache_root)
                .with_context(|| format!("fetching {}", core.identity))?;
        }
    }
    Ok(())
}
