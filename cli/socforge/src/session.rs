//! Per-invocation state: configuration, settings and the populated registry.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use socforge_core::config::CORES_ENV;
use socforge_core::{compose_roots, Config, CoreDescriptor, CoreRegistry, Settings, Vlnv, WordSize};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub cores_roots: Vec<PathBuf>,
    pub word_size: Option<WordSize>,
    pub config: Option<PathBuf>,
}

pub struct Session {
    pub config: Config,
    pub settings: Settings,
    pub registry: CoreRegistry,
}

impl Session {
    /// Load configuration and register every cores root.
    pub fn open(globals: &Globals) -> Result<Self> {
        let config = match &globals.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => Config::load_layered(&Config::default_paths())?,
        };
        let env = std::env::var(CORES_ENV).ok();
        Ok(Self::from_parts(config, env.as_deref(), globals))
    }

    /// Build a session from already-loaded configuration.
    pub fn from_parts(config: Config, env_cores: Option<&str>, globals: &Globals) -> Self {
        let settings = Settings::from_config(&config, globals.word_size);
        let roots = compose_roots(&config, env_cores, &globals.cores_roots);

        let mut registry = CoreRegistry::new();
        let found = registry.add_roots(&roots);
        tracing::debug!(roots = roots.len(), cores = found, "registry populated");

        Session {
            config,
            settings,
            registry,
        }
    }

    /// Look up a core by its command-line name.
    pub fn core(&self, name: &str) -> Result<Arc<CoreDescriptor>> {
        let query = Vlnv::parse(name).with_context(|| format!("invalid core name '{name}'"))?;
        Ok(self.registry.lookup(&query)?)
    }
}
