//! Backend, launch and fetch errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised at the backend boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Preparing the work root failed.
    #[error("failed to configure {tool} in {}: {message}", work_root.display())]
    Configure {
        tool: String,
        work_root: PathBuf,
        message: String,
    },

    /// The build stage failed.
    #[error("{tool} build failed: {message}")]
    Build { tool: String, message: String },

    /// The run stage failed.
    #[error("{tool} run failed: {message}")]
    Run { tool: String, message: String },

    /// No backend is registered under the key.
    #[error("no backend named '{name}' (available: {})", available.join(", "))]
    UnknownBackend { name: String, available: Vec<String> },

    /// An external program could not be started or exited unsuccessfully.
    #[error("'{cmd}' failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Launch {
        cmd: String,
        status: Option<i32>,
        message: String,
    },

    /// Materializing a core's sources failed.
    #[error("failed to fetch '{core}': {message}")]
    Fetch { core: String, message: String },

    /// Errors from the core manager.
    #[error(transparent)]
    Core(#[from] socforge_core::CoreError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
