//! Freshness strategies for cache entries.

use tracing::debug;

use crate::artifact::EntryPaths;
use crate::manifest::DependencyManifest;

/// Strategy deciding whether an existing artifact must be regenerated.
///
/// Implementations are total: any error while evaluating an entry must be
/// reported as stale, never propagated.
pub trait StalenessCheck {
    /// Returns `true` if the entry must be regenerated.
    fn is_stale(&self, entry: &EntryPaths) -> bool;
}

/// Compares the entry's dependency manifest against the filesystem.
///
/// A missing, corrupt or outdated manifest is stale, as is any recorded
/// dependency that is missing or whose modification time differs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCheck;

impl StalenessCheck for ManifestCheck {
    fn is_stale(&self, entry: &EntryPaths) -> bool {
        let Some(manifest) = DependencyManifest::load(&entry.manifest) else {
            debug!(manifest = %entry.manifest.display(), "manifest missing or unreadable");
            return true;
        };
        let changed = manifest.changed_dependencies();
        if changed.is_empty() {
            return false;
        }
        debug!(
            artifact = %entry.artifact.display(),
            changed = ?changed,
            "dependencies changed since generation"
        );
        true
    }
}

/// Never reports an entry as stale.
///
/// Used when automatic rebuilding is disabled: an artifact, once written,
/// is served until it is invalidated explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStale;

impl StalenessCheck for NeverStale {
    fn is_stale(&self, _entry: &EntryPaths) -> bool {
        false
    }
}

impl<S: StalenessCheck + ?Sized> StalenessCheck for Box<S> {
    fn is_stale(&self, entry: &EntryPaths) -> bool {
        (**self).is_stale(entry)
    }
}
