//! Content digests for cache keys.

use std::fmt;

/// A 128-bit digest computed using XXH3.
///
/// Cache keys are the hex rendering of a `ContentHash` over the canonical
/// serialization of a request value, so two requests with the same digest
/// share one cache entry. The digest is stable across processes and
/// platforms.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a digest from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Computes a digest of `data` seeded with a namespace.
    ///
    /// Distinct namespaces yield unrelated digests for the same data, which
    /// lets several caches share one directory without key collisions.
    pub fn from_bytes_in(namespace: &str, data: &[u8]) -> Self {
        let seed = xxhash_rust::xxh3::xxh3_64(namespace.as_bytes());
        let hash = xxhash_rust::xxh3::xxh3_128_with_seed(data, seed);
        Self(hash.to_le_bytes())
    }

    /// Returns the lowercase hex rendering (32 characters).
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}
