//! Core management for hardware IP builds.
//!
//! Discovers core description files under a set of search roots, resolves
//! the dependency closure of a requested core for one flow, and
//! synthesizes a backend-agnostic build descriptor from that closure.
//!
//! # Architecture
//!
//! - **Identity**: `vendor:library:name:version` identities, partial
//!   queries and versioned dependency constraints
//! - **Registry**: root scanning, precedence and lookup
//! - **Resolution**: flow- and flag-aware dependency closure
//! - **Synthesis**: merged files, parameters and tool options
//!
//! Nothing here launches external tools; that is left to backends.

pub mod config;
pub mod core_file;
pub mod error;
pub mod export;
pub mod flags;
pub mod integrity;
pub mod provider;
pub mod registry;
pub mod resolution;
pub mod synth;
pub mod tree;
pub mod version;
pub mod vlnv;

// Re-exports for convenience.
pub use config::{compose_roots, Config, Settings, WordSize};
pub use core_file::CoreDescriptor;
pub use error::{CoreError, Result};
pub use export::export_files;
pub use flags::{Condition, Flags};
pub use integrity::ContentHash;
pub use provider::{CacheStatus, Provider, ProviderKind};
pub use registry::CoreRegistry;
pub use resolution::{resolve, ResolvedClosure, ResolvedCore, Selection};
pub use synth::{synthesize, BuildDescriptor, FileRecord};
pub use tree::format_closure;
pub use version::Version;
pub use vlnv::{Constraint, Vlnv};
