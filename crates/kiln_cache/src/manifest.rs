//! Dependency manifest stored next to every cached artifact.
//!
//! The manifest is stored as `<artifact>.meta`. It records, for every file
//! the generator read, the modification time observed right after the
//! artifact was generated. An entry is fresh only while every recorded file
//! still exists with exactly that modification time.
//!
//! On disk the dependencies are a list of records. A path that is valid
//! UTF-8 is stored as `path`; any other path is stored as its raw OS bytes
//! under `raw_path`, so no dependency is ever lost or rewritten.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use kiln_common::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fs::write_atomic;

/// Current manifest format version. Manifests with any other version are
/// treated as missing.
pub const MANIFEST_FORMAT_VERSION: u32 = 2;

/// Extension appended to the artifact file name to locate its manifest.
pub const MANIFEST_SUFFIX: &str = "meta";

/// Mapping from dependency path to its modification time at generation.
///
/// A `None` timestamp records a dependency that could not be stat'd when the
/// manifest was captured. Such an entry never verifies, so the artifact is
/// rebuilt on the next lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ManifestFile", try_from = "ManifestFile")]
pub struct DependencyManifest {
    /// Manifest format version.
    pub format_version: u32,

    /// Absolute dependency path to observed modification time.
    pub dependencies: BTreeMap<PathBuf, Option<Timestamp>>,
}

impl Default for DependencyManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyManifest {
    /// Creates a new, empty manifest.
    pub fn new() -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            dependencies: BTreeMap::new(),
        }
    }

    /// Stats every path and records its current modification time.
    ///
    /// Relative paths are made absolute against the current directory.
    /// Duplicate paths collapse into one entry.
    pub fn capture<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut manifest = Self::new();
        for path in paths {
            let path = absolute(path.as_ref());
            let mtime = Timestamp::of(&path);
            manifest.dependencies.insert(path, mtime);
        }
        manifest
    }

    /// Loads the manifest at `path`, returning `None` if the file doesn't
    /// exist, can't be parsed, or has a different format version.
    ///
    /// This is fail-safe: any error results in `None`, which callers treat
    /// as stale.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read(path).ok()?;
        let manifest: Self = serde_json::from_slice(&content).ok()?;
        (manifest.format_version == MANIFEST_FORMAT_VERSION).then_some(manifest)
    }

    /// Saves the manifest to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(path, &json)
    }

    /// Returns the recorded dependencies whose current state differs from
    /// the manifest: missing, unreadable, or with a different modification
    /// time.
    pub fn changed_dependencies(&self) -> Vec<PathBuf> {
        self.dependencies
            .iter()
            .filter(|(path, recorded)| !verifies(path, **recorded))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Returns `true` if every recorded dependency is present and unchanged.
    pub fn is_current(&self) -> bool {
        self.dependencies
            .iter()
            .all(|(path, recorded)| verifies(path, *recorded))
    }

    /// Returns the recorded modification time of `path`, if it is a dependency.
    pub fn recorded(&self, path: &Path) -> Option<Option<Timestamp>> {
        self.dependencies.get(&absolute(path)).copied()
    }

    /// Returns the number of recorded dependencies.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Returns `true` if no dependencies are recorded.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Serialized form of [`DependencyManifest`].
#[derive(Serialize, Deserialize)]
struct ManifestFile {
    format_version: u32,
    dependencies: Vec<DependencyRecord>,
}

#[derive(Serialize, Deserialize)]
struct DependencyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_path: Option<Vec<u8>>,
    mtime: Option<Timestamp>,
}

impl From<DependencyManifest> for ManifestFile {
    fn from(manifest: DependencyManifest) -> Self {
        let dependencies = manifest
            .dependencies
            .into_iter()
            .map(|(path, mtime)| match path.into_os_string().into_string() {
                Ok(path) => DependencyRecord {
                    path: Some(path),
                    raw_path: None,
                    mtime,
                },
                Err(raw) => DependencyRecord {
                    path: None,
                    raw_path: Some(raw.as_encoded_bytes().to_vec()),
                    mtime,
                },
            })
            .collect();
        Self {
            format_version: manifest.format_version,
            dependencies,
        }
    }
}

impl TryFrom<ManifestFile> for DependencyManifest {
    type Error = String;

    fn try_from(file: ManifestFile) -> Result<Self, Self::Error> {
        let mut dependencies = BTreeMap::new();
        for record in file.dependencies {
            let path = match (record.path, record.raw_path) {
                (Some(path), None) => PathBuf::from(path),
                (None, Some(raw)) => path_from_raw(raw)?,
                _ => {
                    return Err(
                        "dependency record needs exactly one of `path` or `raw_path`".to_string(),
                    )
                }
            };
            dependencies.insert(path, record.mtime);
        }
        Ok(Self {
            format_version: file.format_version,
            dependencies,
        })
    }
}

#[cfg(unix)]
fn path_from_raw(raw: Vec<u8>) -> Result<PathBuf, String> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(raw)))
}

// Elsewhere only UTF-8 byte strings can be turned back into an `OsString`
// safely; anything else fails to load and the entry is rebuilt.
#[cfg(not(unix))]
fn path_from_raw(raw: Vec<u8>) -> Result<PathBuf, String> {
    String::from_utf8(raw)
        .map(|s| PathBuf::from(OsString::from(s)))
        .map_err(|e| e.to_string())
}

/// Returns the manifest path for an artifact path (`<artifact>.meta`).
pub fn manifest_path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".");
    name.push(MANIFEST_SUFFIX);
    PathBuf::from(name)
}

fn verifies(path: &Path, recorded: Option<Timestamp>) -> bool {
    match (recorded, Timestamp::of(path)) {
        (Some(recorded), Some(observed)) => recorded == observed,
        _ => false,
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
