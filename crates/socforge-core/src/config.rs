//! Configuration files, explicit run settings, and cores root precedence.
//!
//! Configuration is read from `socforge.toml` files:
//!
//! ```toml
//! [main]
//! cores_root = ["~/.local/share/socforge/cores"]
//! systems_root = []
//! build_root = "build"
//! cache_root = "~/.local/share/socforge"
//! ```
//!
//! Files are layered: the user file under `$XDG_CONFIG_HOME/socforge/`
//! first, then `./socforge.toml`. A key set in a later file replaces the
//! earlier value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Environment variable holding extra cores roots, colon separated.
pub const CORES_ENV: &str = "SOCFORGE_CORES";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "socforge.toml";

/// Parsed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub main: MainSection,
}

/// The `[main]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainSection {
    #[serde(default)]
    pub cores_root: Vec<PathBuf>,
    #[serde(default)]
    pub systems_root: Vec<PathBuf>,
    #[serde(default)]
    pub build_root: Option<PathBuf>,
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| CoreError::InvalidConfig {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Default configuration file locations, lowest priority first.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let xdg = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|h| h.join(".config")));
        if let Some(dir) = xdg {
            paths.push(dir.join("socforge").join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from(CONFIG_FILE_NAME));
        paths
    }

    /// Load and layer every existing file in `paths`, in order.
    pub fn load_layered(paths: &[PathBuf]) -> Result<Self> {
        let mut config = Config::default();
        for path in paths.iter().filter(|p| p.is_file()) {
            tracing::debug!(path = %path.display(), "reading configuration");
            config.overlay(Config::load(path)?);
        }
        Ok(config)
    }

    /// Replace every key that `other` sets.
    pub fn overlay(&mut self, other: Config) {
        let main = other.main;
        if !main.cores_root.is_empty() {
            self.main.cores_root = main.cores_root;
        }
        if !main.systems_root.is_empty() {
            self.main.systems_root = main.systems_root;
        }
        if main.build_root.is_some() {
            self.main.build_root = main.build_root;
        }
        if main.cache_root.is_some() {
            self.main.cache_root = main.cache_root;
        }
    }

    pub fn build_root(&self) -> PathBuf {
        self.main
            .build_root
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| PathBuf::from("build"))
    }

    pub fn cache_root(&self) -> PathBuf {
        match &self.main.cache_root {
            Some(path) => expand_home(path),
            None => default_cache_root(),
        }
    }
}

/// Word size forced onto invoked tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    /// Word size of the host.
    pub fn detect() -> Self {
        if cfg!(target_pointer_width = "64") {
            WordSize::Bits64
        } else {
            WordSize::Bits32
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            WordSize::Bits32 => 32,
            WordSize::Bits64 => 64,
        }
    }
}

/// Explicit settings threaded into synthesis and backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub word_size: WordSize,
    pub build_root: PathBuf,
    pub cache_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            word_size: WordSize::detect(),
            build_root: PathBuf::from("build"),
            cache_root: default_cache_root(),
        }
    }
}

impl Settings {
    /// Settings from configuration, with an optional forced word size.
    pub fn from_config(config: &Config, word_size: Option<WordSize>) -> Self {
        Settings {
            word_size: word_size.unwrap_or_else(WordSize::detect),
            build_root: config.build_root(),
            cache_root: config.cache_root(),
        }
    }
}

/// Compose the cores roots in registration order.
///
/// Later registration wins lookups, so the resulting precedence is, from
/// highest: command line roots (last given first), `SOCFORGE_CORES`
/// entries (first listed first), config `systems_root`, config
/// `cores_root`.
pub fn compose_roots(config: &Config, env_cores: Option<&str>, cli_roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    roots.extend(config.main.cores_root.iter().map(|p| expand_home(p)));
    roots.extend(config.main.systems_root.iter().map(|p| expand_home(p)));
    if let Some(env) = env_cores {
        let mut env_roots: Vec<PathBuf> = env
            .split(':')
            .filter(|s| !s.is_empty())
            .map(|s| expand_home(Path::new(s)))
            .collect();
        env_roots.reverse();
        roots.extend(env_roots);
    }
    roots.extend(cli_roots.iter().cloned());
    roots
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().map(|h| h.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn default_cache_root() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join(".local").join("share")))
        .map(|d| d.join("socforge"))
        .unwrap_or_else(|| PathBuf::from(".socforge-cache"))
}

/// Get the user's home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
