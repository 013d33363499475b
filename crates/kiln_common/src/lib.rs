//! Shared foundational types used across the Kiln artifact cache.
//!
//! This crate provides the content digest used for cache keys and the
//! modification timestamp recorded for every dependency of a cached artifact.

#![warn(missing_docs)]

pub mod hash;
pub mod timestamp;

pub use hash::ContentHash;
pub use timestamp::Timestamp;
