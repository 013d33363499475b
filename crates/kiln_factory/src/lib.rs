//! Generated-container factory built on the Kiln artifact cache.
//!
//! A [`ContainerFactory`] turns a list of configuration files plus inline
//! configuration into generated container code. Loading and merging the
//! configuration and compiling it into code are delegated to
//! [`ConfigLoader`] and [`Compiler`] collaborators; the factory assembles
//! their output, collects the files they read, and lets the artifact cache
//! decide whether the code needs to be generated at all.

#![warn(missing_docs)]

pub mod collaborators;
pub mod error;
pub mod factory;
pub mod request;

pub use collaborators::{CompiledUnit, Compiler, ConfigLoader, LoadedConfig};
pub use error::FactoryError;
pub use factory::ContainerFactory;
pub use request::{ConfigSource, ContainerRequest, DEFAULT_CLASS, DEFAULT_PARENT_CLASS};
