//! On-disk artifact storage.
//!
//! Each cache entry occupies three sibling files in the cache directory:
//! the artifact itself at `<key>.<ext>`, its dependency manifest at
//! `<key>.<ext>.meta`, and an empty lock file at `<key>.<ext>.lock` used to
//! serialize regeneration. Artifacts are stored raw so callers can load the
//! file directly.

use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::fs::{remove_if_exists, write_atomic};
use crate::key::CacheKey;
use crate::manifest::{manifest_path_for, DependencyManifest};

/// Extension appended to the artifact file name to locate its lock file.
const LOCK_SUFFIX: &str = "lock";

/// The files making up one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    /// The raw artifact.
    pub artifact: PathBuf,
    /// The dependency manifest (`<artifact>.meta`).
    pub manifest: PathBuf,
    /// The regeneration lock file (`<artifact>.lock`).
    pub lock: PathBuf,
}

/// Store for raw generated artifacts and their manifests.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root cache directory.
    cache_dir: PathBuf,

    /// Artifact file extension, without the dot.
    extension: String,
}

impl ArtifactStore {
    /// Creates a new artifact store rooted at the given cache directory.
    pub fn new(cache_dir: &Path, extension: &str) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            extension: extension.to_string(),
        }
    }

    /// Returns the root cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensures that the cache directory exists.
    pub(crate) fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))
    }

    /// Returns the file paths of the entry for `key`.
    pub fn entry_paths(&self, key: &CacheKey) -> EntryPaths {
        let artifact = self
            .cache_dir
            .join(format!("{}.{}", key.as_str(), self.extension));
        let manifest = manifest_path_for(&artifact);
        let mut lock = artifact.as_os_str().to_os_string();
        lock.push(".");
        lock.push(LOCK_SUFFIX);
        EntryPaths {
            artifact,
            manifest,
            lock: PathBuf::from(lock),
        }
    }

    /// Reads an artifact, returning `None` if it is missing or unreadable.
    pub fn read(&self, entry: &EntryPaths) -> Option<Vec<u8>> {
        std::fs::read(&entry.artifact).ok()
    }

    /// Publishes a freshly generated artifact together with its manifest.
    ///
    /// The previous manifest is removed first, then the artifact and the new
    /// manifest are each written atomically, in that order. An interruption
    /// at any point leaves either the complete old entry (if the removal did
    /// not happen) or an artifact without a manifest, which every reader
    /// treats as stale.
    pub fn publish(
        &self,
        entry: &EntryPaths,
        content: &[u8],
        manifest: &DependencyManifest,
    ) -> Result<(), CacheError> {
        self.ensure_dir()?;
        remove_if_exists(&entry.manifest)?;
        write_atomic(&entry.artifact, content)?;
        manifest.save(&entry.manifest)
    }

    /// Removes the artifact and manifest of an entry.
    ///
    /// The manifest goes first so a concurrent reader never pairs a removed
    /// artifact's manifest with a new one. Returns `true` if an artifact
    /// was removed.
    pub fn remove(&self, entry: &EntryPaths) -> Result<bool, CacheError> {
        remove_if_exists(&entry.manifest)?;
        remove_if_exists(&entry.artifact)
    }
}
