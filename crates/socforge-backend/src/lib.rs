//! Backend boundary for socforge.
//!
//! Backends receive a synthesized build descriptor and a work root and
//! drive an external tool through its configure, build and run stages.
//! This crate also launches external programs and fetches provider
//! sources into the cache.

pub mod backend;
pub mod error;
pub mod fetch;
pub mod generic;
pub mod launcher;

// Re-exports for convenience.
pub use backend::{Backend, BackendContext, BackendFactory, BackendRegistry, GENERIC_BACKEND};
pub use error::{BackendError, Result};
pub use fetch::setup;
pub use generic::GenericBackend;
pub use launcher::{LaunchOutput, Launcher};
