//! Interfaces of the configuration loader and compiler.
//!
//! Both collaborators return the files they read alongside their result.
//! The factory forwards those paths to the cache, which records their
//! modification times in the entry's manifest.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::FactoryError;
use crate::request::ConfigSource;

/// Merged configuration and the files read to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// The merged configuration tree.
    pub config: Value,
    /// Every file the loader read, including included files.
    pub dependencies: Vec<PathBuf>,
}

/// Generated code and the files the compiler read to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Generated source code for the container.
    pub code: String,
    /// Files the compiler depended on (e.g. scanned service definitions).
    pub dependencies: Vec<PathBuf>,
}

/// Loads and merges configuration files.
pub trait ConfigLoader {
    /// Loads `sources` in order, later files overriding earlier ones, on
    /// top of the `base` configuration.
    fn load(
        &mut self,
        sources: &[ConfigSource],
        base: &Map<String, Value>,
    ) -> Result<LoadedConfig, FactoryError>;
}

/// Translates merged configuration into container code.
pub trait Compiler {
    /// Compiles `config` into a type named `class` extending `parent_class`.
    fn compile(
        &mut self,
        config: &Value,
        class: &str,
        parent_class: &str,
    ) -> Result<CompiledUnit, FactoryError>;
}
