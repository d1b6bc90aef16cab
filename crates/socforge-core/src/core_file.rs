//! Core metadata file parsing.
//!
//! A core file is a TOML document with a `.core` extension describing one
//! reusable IP core: its identity, ordered file sets, parameters, per-flow
//! targets with their dependencies and tool options, and an optional
//! provider telling where its sources are fetched from.
//!
//! ```toml
//! name = "acme:peripherals:uart:1.2"
//! description = "16550-style UART"
//!
//! [[filesets]]
//! name = "rtl"
//! file_type = "verilogSource"
//! files = ["rtl/uart_tx.v", { path = "rtl/uart_defs.vh", is_include_file = true }]
//!
//! [parameters.BAUD]
//! datatype = "int"
//! paramtype = "vlogparam"
//! default = 115200
//!
//! [targets.sim]
//! default_tool = "icarus"
//! toplevel = "uart_tb"
//! filesets = ["rtl"]
//! dependencies = ["::fifo:>=1.0", { core = "::debug_probe", use_flags = ["debug"] }]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::flags::Condition;
use crate::provider::Provider;
use crate::vlnv::{Constraint, Vlnv};

/// File extension of core metadata files.
pub const CORE_FILE_EXTENSION: &str = "core";

/// The parsed, immutable description of one core.
#[derive(Debug, Clone)]
pub struct CoreDescriptor {
    pub identity: Vlnv,
    pub description: Option<String>,
    /// Path of the metadata file this descriptor was parsed from.
    pub core_file: PathBuf,
    /// Directory containing the metadata file; file paths are relative to it.
    pub core_root: PathBuf,
    pub file_sets: Vec<FileSet>,
    pub parameters: BTreeMap<String, Parameter>,
    pub targets: BTreeMap<String, Target>,
    pub provider: Option<Provider>,
}

/// A named, flag-gated group of source files.
#[derive(Debug, Clone)]
pub struct FileSet {
    pub name: String,
    pub files: Vec<SourceFile>,
    pub condition: Condition,
}

/// A source file as declared in a file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_type: Option<String>,
    pub is_include_file: bool,
    pub logical_name: Option<String>,
}

/// A build parameter declared by a core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub datatype: Datatype,
    #[serde(default)]
    pub paramtype: Option<Paramtype>,
    #[serde(default)]
    pub default: Option<toml::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Bool,
    Int,
    Str,
    File,
    Real,
}

impl Datatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::Bool => "bool",
            Datatype::Int => "int",
            Datatype::Str => "str",
            Datatype::File => "file",
            Datatype::Real => "real",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paramtype {
    Plusarg,
    Vlogparam,
    Vlogdefine,
    Generic,
    Cmdlinearg,
}

/// Per-flow configuration of a core.
#[derive(Debug, Clone)]
pub struct Target {
    pub default_tool: Option<String>,
    pub toplevel: Option<String>,
    /// File sets used by this target, in order.
    pub filesets: Vec<String>,
    /// Parameters exposed by this target; `None` exposes all of the core's parameters.
    pub parameters: Option<Vec<String>>,
    pub dependencies: Vec<DependencyDecl>,
    pub tool_options: BTreeMap<String, toml::Table>,
}

impl Target {
    /// Tools this target carries options for.
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.tool_options.keys().map(String::as_str)
    }
}

/// A dependency edge, present only when its condition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub constraint: Constraint,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
struct RawCoreFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    filesets: Vec<RawFileSet>,
    #[serde(default)]
    parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    targets: BTreeMap<String, RawTarget>,
    #[serde(default)]
    provider: Option<Provider>,
}

#[derive(Debug, Deserialize)]
struct RawFileSet {
    name: String,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    use_flags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFile {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        file_type: Option<String>,
        #[serde(default)]
        is_include_file: bool,
        #[serde(default)]
        logical_name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(default)]
    default_tool: Option<String>,
    #[serde(default)]
    toplevel: Option<String>,
    #[serde(default)]
    filesets: Vec<String>,
    #[serde(default)]
    parameters: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    tool_options: BTreeMap<String, toml::Table>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Plain(String),
    Conditional {
        core: String,
        #[serde(default)]
        use_flags: Vec<String>,
    },
}

impl CoreDescriptor {
    /// Parse a core description from TOML text.
    ///
    /// `core_file` is the path the text was read from; it is used for
    /// error reporting and to anchor relative file paths.
    pub fn parse(input: &str, core_file: &Path) -> Result<Self> {
        let invalid = |detail: String| CoreError::InvalidCoreFile {
            path: core_file.to_path_buf(),
            detail,
        };

        let raw: RawCoreFile = toml::from_str(input).map_err(|e| invalid(e.to_string()))?;
        let identity = Vlnv::parse(&raw.name).map_err(|e| invalid(e.to_string()))?;

        let mut file_sets: Vec<FileSet> = Vec::with_capacity(raw.filesets.len());
        for fs in raw.filesets {
            if file_sets.iter().any(|existing| existing.name == fs.name) {
                return Err(invalid(format!("duplicate file set '{}'", fs.name)));
            }
            let files = fs
                .files
                .into_iter()
                .map(|f| f.into_source_file(fs.file_type.as_deref()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|detail| invalid(format!("file set '{}': {detail}", fs.name)))?;
            file_sets.push(FileSet {
                name: fs.name,
                files,
                condition: Condition::parse(&fs.use_flags),
            });
        }

        let mut targets = BTreeMap::new();
        for (target_name, raw_target) in raw.targets {
            for fs in &raw_target.filesets {
                if !file_sets.iter().any(|f| &f.name == fs) {
                    return Err(invalid(format!(
                        "target '{target_name}' uses undeclared file set '{fs}'"
                    )));
                }
            }
            if let Some(params) = &raw_target.parameters {
                if let Some(missing) = params.iter().find(|p| !raw.parameters.contains_key(*p)) {
                    return Err(invalid(format!(
                        "target '{target_name}' uses undeclared parameter '{missing}'"
                    )));
                }
            }
            let dependencies = raw_target
                .dependencies
                .into_iter()
                .map(RawDependency::into_decl)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| invalid(format!("target '{target_name}': {e}")))?;

            targets.insert(
                target_name,
                Target {
                    default_tool: raw_target.default_tool,
                    toplevel: raw_target.toplevel,
                    filesets: raw_target.filesets,
                    parameters: raw_target.parameters,
                    dependencies,
                    tool_options: raw_target.tool_options,
                },
            );
        }

        let core_root = core_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(CoreDescriptor {
            identity,
            description: raw.description,
            core_file: core_file.to_path_buf(),
            core_root,
            file_sets,
            parameters: raw.parameters,
            targets,
            provider: raw.provider,
        })
    }

    /// Load a core description from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Look up a file set by name.
    pub fn file_set(&self, name: &str) -> Option<&FileSet> {
        self.file_sets.iter().find(|fs| fs.name == name)
    }

    /// A core with no targets at all only ever serves as a dependency.
    pub fn is_leaf(&self) -> bool {
        self.targets.is_empty()
    }

    /// Directory that source file paths are relative to.
    ///
    /// Cores with a cachable git or url provider keep their sources in the
    /// cache. Everything else is relative to the core root.
    pub fn files_root(&self, cache_root: &Path) -> PathBuf {
        match &self.provider {
            Some(provider) if provider.fetches_into_cache() => {
                provider.cache_dir(cache_root, &self.identity)
            }
            _ => self.core_root.clone(),
        }
    }
}

impl RawFile {
    fn into_source_file(self, default_type: Option<&str>) -> std::result::Result<SourceFile, String> {
        let file = match self {
            RawFile::Path(path) => SourceFile {
                path: PathBuf::from(path),
                file_type: default_type.map(str::to_string),
                is_include_file: false,
                logical_name: None,
            },
            RawFile::Detailed {
                path,
                file_type,
                is_include_file,
                logical_name,
            } => SourceFile {
                path: PathBuf::from(path),
                file_type: file_type.or_else(|| default_type.map(str::to_string)),
                is_include_file,
                logical_name,
            },
        };
        if file.path.as_os_str().is_empty() {
            return Err("empty file path".to_string());
        }
        Ok(file)
    }
}

impl RawDependency {
    fn into_decl(self) -> Result<DependencyDecl> {
        match self {
            RawDependency::Plain(text) => Ok(DependencyDecl {
                constraint: Constraint::parse(&text)?,
                condition: Condition::always(),
            }),
            RawDependency::Conditional { core, use_flags } => Ok(DependencyDecl {
                constraint: Constraint::parse(&core)?,
                condition: Condition::parse(&use_flags),
            }),
        }
    }
}
