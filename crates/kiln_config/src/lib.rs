//! Parsing and validation of `kiln.toml` cache configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`KilnConfig`] describing where cached artifacts live and how their
//! freshness is checked.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
