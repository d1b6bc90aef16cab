//! Core manager error types.

use std::path::PathBuf;

/// Errors raised while registering, resolving or synthesizing cores.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Identity text could not be split into components, or its version is not comparable.
    #[error("malformed core identity '{text}': {detail}")]
    MalformedIdentity { text: String, detail: String },

    /// A search root does not exist or cannot be read.
    #[error("cores root not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// No registered core matches the query.
    #[error("core not found: {query}")]
    CoreNotFound { query: String },

    /// The core has targets, but none applies to the requested flow.
    #[error("core '{core}' does not support flow '{flow}'")]
    FlowNotSupported { core: String, flow: String },

    /// A dependency constraint matched no registered core.
    #[error("'{}' or any of its dependencies requires '{required}', but this core was not found", chain.first().map(String::as_str).unwrap_or("?"))]
    Dependency {
        required: String,
        /// Cores that led to the unresolved constraint, root first.
        chain: Vec<String>,
    },

    /// A dependency edge leads back onto the traversal stack.
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// The full cycle; the first and last entries are the same core.
        cycle: Vec<String>,
    },

    /// Two requirements on the same core cannot be satisfied by one version.
    #[error("version conflict for '{core}': '{first}' (required by {first_by}) vs '{second}' (required by {second_by})")]
    VersionConflict {
        core: String,
        first: String,
        first_by: String,
        second: String,
        second_by: String,
    },

    /// Two cores declare the same parameter with different datatypes.
    #[error("parameter '{name}' declared as '{first}' by {first_core} and as '{second}' by {second_core}")]
    ParameterConflict {
        name: String,
        first: String,
        first_core: String,
        second: String,
        second_core: String,
    },

    /// The explicitly requested tool is not configured for the flow.
    #[error("tool '{tool}' is not supported by '{core}' for '{flow}' (available: {})", available.join(", "))]
    UnsupportedTool {
        core: String,
        flow: String,
        tool: String,
        available: Vec<String>,
    },

    /// No tool was supplied and the target declares no default.
    #[error("no tool supplied and no default tool configured for '{core}' in '{flow}'")]
    NoToolConfigured { core: String, flow: String },

    /// A core metadata file failed to parse or validate.
    #[error("invalid core file {}: {detail}", path.display())]
    InvalidCoreFile { path: PathBuf, detail: String },

    /// A configuration file failed to parse.
    #[error("invalid configuration {}: {detail}", path.display())]
    InvalidConfig { path: PathBuf, detail: String },

    /// Copying files into the export tree failed.
    #[error("export failed at {}: {detail}", path.display())]
    Export { path: PathBuf, detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core manager operations.
pub type Result<T> = std::result::Result<T, CoreError>;
