//! Content fingerprints for build descriptors.
//!
//! A descriptor's fingerprint is the SHA-256 of its JSON serialization.
//! Identical closures with identical selections give identical
//! fingerprints.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::synth::BuildDescriptor;

/// A content hash (SHA-256 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex_encode(&hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first twelve hex digits, for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl BuildDescriptor {
    /// Fingerprint of the descriptor's content.
    pub fn fingerprint(&self) -> Result<ContentHash> {
        let json = serde_json::to_vec(self)?;
        Ok(ContentHash::compute(&json))
    }
}
