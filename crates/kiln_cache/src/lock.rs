//! Per-entry advisory lock serializing regeneration.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs4::fs_std::FileExt;
use tracing::trace;

use crate::error::CacheError;

/// Exclusive advisory lock on an entry's lock file.
///
/// Held for the duration of one regeneration so that concurrent callers,
/// in this process or others, wait for the first writer instead of
/// generating the same artifact again. Released when dropped. The lock file
/// itself is left in place; deleting it would let two writers lock
/// different inodes.
#[derive(Debug)]
pub struct EntryLock {
    _file: File,
}

impl EntryLock {
    /// Blocks until the lock at `path` is acquired, creating the file if needed.
    pub fn acquire(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| CacheError::Lock {
                path: path.to_path_buf(),
                source: e,
            })?;
        FileExt::lock_exclusive(&file).map_err(|e| CacheError::Lock {
            path: path.to_path_buf(),
            source: e,
        })?;
        trace!(lock = %path.display(), "acquired entry lock");
        Ok(Self { _file: file })
    }
}
