//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reads are fail-safe: a missing or unreadable manifest, or a dependency
/// that cannot be stat'd, turns into a rebuild rather than an error. This
/// enum covers the failures that are surfaced to the caller: deriving a key,
/// acquiring the regeneration lock and persisting a rebuilt entry.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The request value could not be turned into a cache key.
    #[error("failed to fingerprint cache request: {reason}")]
    Fingerprint {
        /// Description of the canonicalization failure.
        reason: String,
    },

    /// The per-key regeneration lock could not be acquired.
    #[error("failed to lock cache entry {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
