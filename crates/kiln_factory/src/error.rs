//! Error types for container generation.

use kiln_cache::CacheError;

/// Errors that can occur while producing a generated container.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// The artifact cache failed to derive a key, lock or persist the entry.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The configuration loader failed.
    #[error("failed to load configuration: {reason}")]
    Load {
        /// Description of the loader failure.
        reason: String,
    },

    /// The compiler failed.
    #[error("failed to compile container: {reason}")]
    Compile {
        /// Description of the compiler failure.
        reason: String,
    },
}

impl FactoryError {
    /// Creates a loader error.
    pub fn load(reason: impl Into<String>) -> Self {
        Self::Load {
            reason: reason.into(),
        }
    }

    /// Creates a compiler error.
    pub fn compile(reason: impl Into<String>) -> Self {
        Self::Compile {
            reason: reason.into(),
        }
    }
}
