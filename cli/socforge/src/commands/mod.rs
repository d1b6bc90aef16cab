//! CLI command implementations.

pub mod fetch;
pub mod flow;
pub mod info;
pub mod list;
