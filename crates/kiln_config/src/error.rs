//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `kiln.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required `[cache]` key is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A `[cache]` value cannot be used to name cache files.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Dotted key of the offending value, e.g. `cache.extension`.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
