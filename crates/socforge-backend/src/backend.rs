//! The backend capability trait and the name-keyed backend registry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use socforge_core::{BuildDescriptor, Settings};

use crate::error::{BackendError, Result};
use crate::generic::GenericBackend;

/// Key of the descriptor-driven fallback backend.
pub const GENERIC_BACKEND: &str = "generic";

/// Everything a backend is constructed from.
#[derive(Debug, Clone)]
pub struct BackendContext {
    pub descriptor: BuildDescriptor,
    /// Directory the backend owns for generated files and tool output.
    pub work_root: PathBuf,
    pub settings: Settings,
}

/// A tool adapter driving one EDA tool through its stages.
///
/// Stages are invoked in order `configure`, `build`, `run`; any of them
/// may be skipped by the caller.
pub trait Backend: fmt::Debug {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Prepare the work root. `args` are tool-specific arguments.
    fn configure(&mut self, args: &[String]) -> Result<()>;

    /// Run the tool's build stage in the work root.
    fn build(&mut self) -> Result<()>;

    /// Run the tool's run stage in the work root.
    fn run(&mut self, args: &[String]) -> Result<()>;
}

/// Constructor stored in the registry.
pub type BackendFactory = fn(BackendContext) -> Box<dyn Backend>;

/// Registry of backend constructors keyed by tool name.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(GENERIC_BACKEND, generic);
        registry
    }

    /// Register a backend, replacing any earlier one under the same name.
    pub fn register(&mut self, name: &str, factory: BackendFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Construct the backend registered under `name`.
    pub fn create(&self, name: &str, ctx: BackendContext) -> Result<Box<dyn Backend>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend {
                name: name.to_string(),
                available: self.names().iter().map(|n| n.to_string()).collect(),
            })?;
        Ok(factory(ctx))
    }

    /// Construct the backend for the descriptor's tool, falling back to
    /// the generic backend when the tool has no adapter of its own.
    pub fn for_tool(&self, ctx: BackendContext) -> Result<Box<dyn Backend>> {
        let tool = ctx.descriptor.tool.clone();
        if self.contains(&tool) {
            self.create(&tool, ctx)
        } else {
            tracing::debug!(tool = %tool, "no dedicated backend; using generic");
            self.create(GENERIC_BACKEND, ctx)
        }
    }
}

fn generic(ctx: BackendContext) -> Box<dyn Backend> {
    Box::new(GenericBackend::new(ctx))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use socforge_core::{resolve, synthesize, CoreDescriptor, CoreRegistry, Selection, Vlnv};

    use super::*;

    /// A descriptor for a one-core design whose files live in `dir`.
    pub fn context(dir: &Path, tool_options: &str) -> BackendContext {
        let text = format!(
            r#"
name = "acme:ip:blinky:1.0"

[[filesets]]
name = "rtl"
file_type = "verilogSource"
files = ["blinky.v"]

[parameters.WIDTH]
datatype = "int"
paramtype = "vlogparam"
default = 8

[targets.sim]
default_tool = "icarus"
toplevel = "blinky"
filesets = ["rtl"]

[targets.sim.tool_options.icarus]
{tool_options}
"#
        );
        let core = CoreDescriptor::parse(&text, &dir.join("blinky.core")).unwrap();
        let mut registry = CoreRegistry::new();
        registry.insert(core);
        let closure = resolve(&registry, &Vlnv::named("blinky"), &Selection::new("sim")).unwrap();
        let settings = Settings::default();
        let descriptor = synthesize(&closure, None, &settings).unwrap();
        BackendContext {
            descriptor,
            work_root: dir.join("build"),
            settings,
        }
    }
}
