//! Atomic file publication.

use std::io::Write;
use std::path::Path;

use crate::error::CacheError;

/// Writes `data` to `path` so that readers observe either the previous file
/// or the complete new one, never a truncated mix.
///
/// The bytes go to a temporary file in the same directory, are flushed to
/// disk, and the file is renamed over `path`. On any failure the temporary
/// file is removed and `path` is left untouched.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".kiln-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CacheError::io(dir, e))?;
    tmp.write_all(data)
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}

/// Removes `path`, treating an already-missing file as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}
