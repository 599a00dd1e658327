//! Content digests for curation records.
//!
//! A run fingerprints the store before and after it touches anything, so
//! the report can say whether the store moved.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase sha256 hex over `name:value` lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn builder() -> ContentHashBuilder {
        ContentHashBuilder {
            state: Sha256::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feeds named fields into a running sha256.
///
/// Field order is part of the digest. Callers walk records in accession
/// order.
pub struct ContentHashBuilder {
    state: Sha256,
}

impl ContentHashBuilder {
    pub fn field(mut self, name: &str, value: &str) -> Self {
        for part in [name.as_bytes(), b":", value.as_bytes(), b"\n"] {
            self.state.update(part);
        }
        self
    }

    /// Absent values contribute nothing, not an empty line.
    pub fn field_opt(self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            return self.field(name, value);
        }
        self
    }

    pub fn finish(self) -> ContentHash {
        ContentHash(format!("{:x}", self.state.finalize()))
    }
}
