//! On-disk cache of generated artifacts.
//!
//! Given a request value and a generator, [`ArtifactCache::get_or_build`]
//! derives a deterministic key, serves the stored artifact if every file
//! the last generation depended on still has its recorded modification
//! time, and otherwise regenerates the artifact and atomically publishes it
//! together with a fresh dependency manifest.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
mod fs;
pub mod key;
pub mod lock;
pub mod manifest;
pub mod staleness;

pub use artifact::{ArtifactStore, EntryPaths};
pub use cache::{
    ArtifactCache, ArtifactHandle, CacheOutcome, ConfiguredCache, GenerationResult,
    DEFAULT_EXTENSION,
};
pub use error::CacheError;
pub use key::{CacheKey, Fingerprinter, KeyDeriver};
pub use lock::EntryLock;
pub use manifest::{DependencyManifest, MANIFEST_FORMAT_VERSION, MANIFEST_SUFFIX};
pub use staleness::{ManifestCheck, NeverStale, StalenessCheck};
