//! Cache key derivation.
//!
//! A cache key is derived from the logical request value, never from file
//! contents. The default [`Fingerprinter`] canonicalizes the request through
//! `serde_json::Value` and hashes the result with XXH3-128:
//!
//! - struct fields and map entries are emitted sorted by key, so neither
//!   declaration order nor `HashMap` iteration order affects the key;
//! - sequences keep their order, so a list of configuration files merged in
//!   sequence yields a different key when reordered.

use std::fmt;

use kiln_common::ContentHash;
use serde::Serialize;
use serde_json::Value;

use crate::error::CacheError;

/// Opaque identifier locating one cache entry.
///
/// Keys are used verbatim as file stems, so they are restricted to ASCII
/// alphanumerics, `-` and `_`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from a custom string, validating that it is a safe file stem.
    pub fn new(key: impl Into<String>) -> Result<Self, CacheError> {
        let key = key.into();
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::Fingerprint {
                reason: format!("'{key}' is not a valid cache key"),
            });
        }
        Ok(Self(key))
    }

    /// Creates a key from a digest.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash.to_hex())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}

/// Strategy that maps a request value to its cache key.
///
/// Implementations must be deterministic across process runs: equal
/// requests always produce equal keys.
pub trait KeyDeriver<R: ?Sized> {
    /// Derives the cache key for `request`.
    fn derive(&self, request: &R) -> Result<CacheKey, CacheError>;
}

/// Default key deriver: canonical JSON value hashed with XXH3-128.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    namespace: Option<String>,
}

impl Fingerprinter {
    /// Creates a fingerprinter without a namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fingerprinter whose keys are salted with `namespace`.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// Returns the canonical byte serialization of `request`.
    ///
    /// Map entries are sorted by key at every level and sequences keep their
    /// order, whatever map implementation `serde_json` was built with. Fails
    /// if the request contains a map whose keys are not strings.
    pub fn canonical_bytes<R: Serialize + ?Sized>(request: &R) -> Result<Vec<u8>, CacheError> {
        let value = serde_json::to_value(request).map_err(|e| CacheError::Fingerprint {
            reason: e.to_string(),
        })?;
        serde_json::to_vec(&canonicalize(value)).map_err(|e| CacheError::Fingerprint {
            reason: e.to_string(),
        })
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

impl<R: Serialize + ?Sized> KeyDeriver<R> for Fingerprinter {
    fn derive(&self, request: &R) -> Result<CacheKey, CacheError> {
        let bytes = Self::canonical_bytes(request)?;
        let hash = match &self.namespace {
            Some(ns) => ContentHash::from_bytes_in(ns, &bytes),
            None => ContentHash::from_bytes(&bytes),
        };
        Ok(CacheKey::from_hash(hash))
    }
}
