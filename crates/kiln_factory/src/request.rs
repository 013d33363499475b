//! The fingerprinted description of a generated container.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default name of the generated container type.
pub const DEFAULT_CLASS: &str = "SystemContainer";

/// Default base type the generated container extends.
pub const DEFAULT_PARENT_CLASS: &str = "Container";

/// One configuration file, optionally restricted to a named section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Path of the configuration file.
    pub path: PathBuf,
    /// Section to load, or the whole file when `None`.
    pub section: Option<String>,
}

impl ConfigSource {
    /// Creates a source for the whole file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            section: None,
        }
    }

    /// Creates a source for one section of a file.
    pub fn with_section(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: Some(section.into()),
        }
    }
}

/// Everything that determines the generated container.
///
/// This is the value the cache key is derived from. Configuration files
/// are kept in load order, since later files override earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRequest {
    /// Inline configuration the files are merged over.
    pub config: Map<String, Value>,
    /// Configuration files, in load order.
    pub config_files: Vec<ConfigSource>,
    /// Name of the generated container type.
    pub class: String,
    /// Base type of the generated container.
    pub parent_class: String,
}

impl Default for ContainerRequest {
    fn default() -> Self {
        Self {
            config: Map::new(),
            config_files: Vec::new(),
            class: DEFAULT_CLASS.to_string(),
            parent_class: DEFAULT_PARENT_CLASS.to_string(),
        }
    }
}
