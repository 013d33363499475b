//! Configuration types deserialized from `kiln.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// The top-level configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct KilnConfig {
    /// Artifact cache settings.
    pub cache: CacheConfig,
}

/// Settings for one on-disk artifact cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory holding artifacts, manifests and lock files.
    pub directory: PathBuf,
    /// File extension given to artifacts (without the leading dot).
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Optional salt mixed into every cache key.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether dependency timestamps are checked on every lookup.
    ///
    /// When `false` an existing artifact is always served, which suits
    /// deployments where the configuration files never change at runtime.
    #[serde(default = "default_true")]
    pub auto_rebuild: bool,
    /// Whether concurrent callers wait for one generation of a key instead
    /// of each generating it. Publishing is serialized either way.
    #[serde(default = "default_true")]
    pub lock: bool,
}

impl CacheConfig {
    /// Creates a configuration with default settings for `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: default_extension(),
            namespace: None,
            auto_rebuild: true,
            lock: true,
        }
    }
}

fn default_extension() -> String {
    "gen".to_string()
}

fn default_true() -> bool {
    true
}
