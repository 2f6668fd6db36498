//! Content fingerprinting for cache keys and invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit content fingerprint computed using XXH3.
///
/// Two artifacts with the same `Fingerprint` are assumed to have identical
/// content. Used throughout the build pipeline to decide whether a previously
/// cached result may be reused. Collisions are not defended against.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Computes a fingerprint from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes a fingerprint over an (identifier, content) pair.
    ///
    /// The identifier is length-prefixed so the boundary between it and the
    /// content is unambiguous: `("ab", "c")` and `("a", "bc")` hash differently.
    pub fn of(id: &str, content: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(8 + id.len() + content.len());
        buf.extend_from_slice(&(id.len() as u64).to_le_bytes());
        buf.extend_from_slice(id.as_bytes());
        buf.extend_from_slice(content);
        Self::from_bytes(&buf)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}
