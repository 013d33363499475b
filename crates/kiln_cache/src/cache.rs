//! High-level cache orchestrator.
//!
//! [`ArtifactCache`] ties together key derivation, the freshness strategy,
//! the artifact store and the per-entry lock into a single `get_or_build`
//! entry point. Reads are fail-safe: anything that prevents verifying an
//! entry results in a rebuild, never in serving an unverified artifact.

use std::path::{Path, PathBuf};

use kiln_config::CacheConfig;
use tracing::{debug, info};

use crate::artifact::{ArtifactStore, EntryPaths};
use crate::error::CacheError;
use crate::key::{CacheKey, Fingerprinter, KeyDeriver};
use crate::lock::EntryLock;
use crate::manifest::DependencyManifest;
use crate::staleness::{ManifestCheck, NeverStale, StalenessCheck};

/// Default artifact file extension.
pub const DEFAULT_EXTENSION: &str = "gen";

/// Output of one generation pass.
///
/// The generator returns the dependency set it touched instead of recording
/// it in shared state, so the set that ends up in the manifest is exactly
/// the one produced alongside this content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Generated artifact bytes.
    pub content: Vec<u8>,
    /// Files read while generating `content`.
    pub dependencies: Vec<PathBuf>,
}

impl GenerationResult {
    /// Creates a generation result from content and its dependency paths.
    pub fn new<C, I, P>(content: C, dependencies: I) -> Self
    where
        C: Into<Vec<u8>>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            content: content.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// How an [`ArtifactHandle`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// An existing, verified artifact was served.
    Hit,
    /// The artifact was (re)generated during this call.
    Built,
}

/// A cached artifact ready to be loaded by the caller.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    key: CacheKey,
    path: PathBuf,
    content: Vec<u8>,
    outcome: CacheOutcome,
}

impl ArtifactHandle {
    /// Returns the entry's cache key.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns the path of the artifact file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the artifact bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the artifact as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Consumes the handle, returning the artifact bytes.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Returns whether the artifact was served or rebuilt.
    pub fn outcome(&self) -> CacheOutcome {
        self.outcome
    }

    /// Returns `true` if the artifact was served without regeneration.
    pub fn is_hit(&self) -> bool {
        self.outcome == CacheOutcome::Hit
    }
}

/// Cache built from a [`CacheConfig`], whose freshness strategy is chosen at runtime.
pub type ConfiguredCache = ArtifactCache<Fingerprinter, Box<dyn StalenessCheck + Send + Sync>>;

/// On-disk cache of generated artifacts invalidated by dependency timestamps.
///
/// `K` derives cache keys from request values and `S` decides whether an
/// existing artifact is still valid.
pub struct ArtifactCache<K = Fingerprinter, S = ManifestCheck> {
    /// Artifact and manifest storage.
    store: ArtifactStore,

    /// Request-to-key strategy.
    deriver: K,

    /// Freshness strategy.
    staleness: S,

    /// Whether generation waits on the per-entry lock (single flight).
    lock: bool,
}

impl ArtifactCache {
    /// Creates a cache in `cache_dir` with default key derivation,
    /// manifest-based freshness and per-entry locking.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            store: ArtifactStore::new(cache_dir, DEFAULT_EXTENSION),
            deriver: Fingerprinter::new(),
            staleness: ManifestCheck,
            lock: true,
        }
    }
}

impl ConfiguredCache {
    /// Creates a cache from configuration.
    ///
    /// `auto_rebuild = false` selects [`NeverStale`], which serves any
    /// existing artifact without checking its dependencies.
    pub fn from_config(config: &CacheConfig) -> Self {
        let staleness: Box<dyn StalenessCheck + Send + Sync> = if config.auto_rebuild {
            Box::new(ManifestCheck)
        } else {
            Box::new(NeverStale)
        };
        let deriver = match &config.namespace {
            Some(ns) => Fingerprinter::with_namespace(ns.clone()),
            None => Fingerprinter::new(),
        };
        Self {
            store: ArtifactStore::new(&config.directory, &config.extension),
            deriver,
            staleness,
            lock: config.lock,
        }
    }
}

impl<K, S> ArtifactCache<K, S> {
    /// Replaces the key derivation strategy.
    pub fn with_key_deriver<K2>(self, deriver: K2) -> ArtifactCache<K2, S> {
        ArtifactCache {
            store: self.store,
            deriver,
            staleness: self.staleness,
            lock: self.lock,
        }
    }

    /// Replaces the freshness strategy.
    pub fn with_staleness_check<S2>(self, staleness: S2) -> ArtifactCache<K, S2> {
        ArtifactCache {
            store: self.store,
            deriver: self.deriver,
            staleness,
            lock: self.lock,
        }
    }

    /// Sets the artifact file extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.store = ArtifactStore::new(self.store.cache_dir(), extension);
        self
    }

    /// Enables or disables waiting on the per-entry lock during generation.
    ///
    /// Without it, concurrent callers may generate the same entry more than
    /// once. Publishing still takes the lock, so the last writer's artifact
    /// and manifest always end up on disk together.
    pub fn with_locking(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Returns the underlying artifact store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}

impl<K, S: StalenessCheck> ArtifactCache<K, S> {
    /// Derives the cache key for `request`.
    pub fn key_for<R: ?Sized>(&self, request: &R) -> Result<CacheKey, CacheError>
    where
        K: KeyDeriver<R>,
    {
        self.deriver.derive(request)
    }

    /// Returns the files of the entry `request` maps to.
    pub fn entry_paths<R: ?Sized>(&self, request: &R) -> Result<EntryPaths, CacheError>
    where
        K: KeyDeriver<R>,
    {
        Ok(self.store.entry_paths(&self.key_for(request)?))
    }

    /// Returns `true` if the entry for `request` would be regenerated by the
    /// freshness strategy, regardless of whether its artifact exists.
    pub fn is_stale<R: ?Sized>(&self, request: &R) -> Result<bool, CacheError>
    where
        K: KeyDeriver<R>,
    {
        Ok(self.staleness.is_stale(&self.entry_paths(request)?))
    }

    /// Returns the artifact for `request` if a fresh one exists, without
    /// ever generating.
    pub fn lookup<R: ?Sized>(&self, request: &R) -> Result<Option<ArtifactHandle>, CacheError>
    where
        K: KeyDeriver<R>,
    {
        let key = self.key_for(request)?;
        let entry = self.store.entry_paths(&key);
        Ok(self.load_fresh(&key, &entry))
    }

    /// Returns the artifact for `request`, generating it if it is missing
    /// or stale.
    ///
    /// `generate` runs at most once, and only when no fresh artifact exists.
    /// Its error is returned unchanged and nothing is written. Cache
    /// failures (key derivation, locking, persistence) are converted into
    /// `E`.
    pub fn get_or_build<R, F, E>(&self, request: &R, generate: F) -> Result<ArtifactHandle, E>
    where
        R: ?Sized,
        K: KeyDeriver<R>,
        F: FnOnce() -> Result<GenerationResult, E>,
        E: From<CacheError>,
    {
        let key = self.key_for(request)?;
        let entry = self.store.entry_paths(&key);

        if let Some(handle) = self.load_fresh(&key, &entry) {
            debug!(key = %key, "artifact cache hit");
            return Ok(handle);
        }

        let single_flight = if self.lock {
            let guard = EntryLock::acquire(&entry.lock)?;
            // Another caller may have rebuilt the entry while we waited.
            if let Some(handle) = self.load_fresh(&key, &entry) {
                debug!(key = %key, "artifact rebuilt by concurrent caller");
                return Ok(handle);
            }
            Some(guard)
        } else {
            None
        };

        info!(key = %key, artifact = %entry.artifact.display(), "generating artifact");
        let generated = generate()?;
        let manifest = DependencyManifest::capture(&generated.dependencies);

        // Publish steps of concurrent writers must never interleave, even
        // without single flight.
        let _guard = match single_flight {
            Some(guard) => guard,
            None => EntryLock::acquire(&entry.lock)?,
        };
        self.store
            .publish(&entry, &generated.content, &manifest)?;
        debug!(
            key = %key,
            dependencies = manifest.len(),
            "published artifact and manifest"
        );

        Ok(ArtifactHandle {
            key,
            path: entry.artifact,
            content: generated.content,
            outcome: CacheOutcome::Built,
        })
    }

    /// Removes the entry for `request`. Returns `true` if an artifact existed.
    pub fn invalidate<R: ?Sized>(&self, request: &R) -> Result<bool, CacheError>
    where
        K: KeyDeriver<R>,
    {
        let entry = self.entry_paths(request)?;
        let _guard = EntryLock::acquire(&entry.lock)?;
        let removed = self.store.remove(&entry)?;
        if removed {
            debug!(artifact = %entry.artifact.display(), "invalidated artifact");
        }
        Ok(removed)
    }

    fn load_fresh(&self, key: &CacheKey, entry: &EntryPaths) -> Option<ArtifactHandle> {
        if !entry.artifact.is_file() || self.staleness.is_stale(entry) {
            return None;
        }
        let content = self.store.read(entry)?;
        Some(ArtifactHandle {
            key: key.clone(),
            path: entry.artifact.clone(),
            content,
            outcome: CacheOutcome::Hit,
        })
    }
}
