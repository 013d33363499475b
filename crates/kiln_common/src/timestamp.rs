//! File modification timestamps recorded in dependency manifests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A file modification time in whole seconds since the Unix epoch.
///
/// Timestamps are compared for equality only: a dependency whose
/// modification time moved in either direction counts as changed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from seconds since the Unix epoch.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the number of seconds since the Unix epoch.
    pub fn as_secs(self) -> i64 {
        self.0
    }

    /// Truncates a `SystemTime` to whole seconds.
    ///
    /// Times before the epoch map to negative values.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(i64::try_from(d.as_secs()).unwrap_or(i64::MAX)),
            Err(e) => Self(-i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX)),
        }
    }

    /// Converts back into a `SystemTime`.
    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.0.unsigned_abs())
        } else {
            UNIX_EPOCH - Duration::from_secs(self.0.unsigned_abs())
        }
    }

    /// Reads the modification time of `path`.
    ///
    /// Returns `None` if the file cannot be stat'd for any reason (missing,
    /// permission denied, platform without mtime support). Callers treat
    /// `None` as "changed".
    pub fn of(path: &Path) -> Option<Self> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(Self::from_system_time(modified))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_roundtrip() {
        let t = Timestamp::from_secs(1_700_000_000);
        assert_eq!(Timestamp::from_system_time(t.to_system_time()), t);
    }

    #[test]
    fn pre_epoch_is_negative() {
        let t = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(Timestamp::from_system_time(t).as_secs(), -60);
    }

    #[test]
    fn sub_second_precision_is_truncated() {
        let t = UNIX_EPOCH + Duration::from_millis(5_999);
        assert_eq!(Timestamp::from_system_time(t).as_secs(), 5);
    }

    #[test]
    fn of_reads_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.conf");
        std::fs::write(&path, "db.dsn = sqlite::memory:").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(Timestamp::from_secs(1_600_000_000).to_system_time())
            .unwrap();
        drop(file);

        assert_eq!(Timestamp::of(&path), Some(Timestamp::from_secs(1_600_000_000)));
    }

    #[test]
    fn of_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Timestamp::of(&dir.path().join("missing.conf")).is_none());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Timestamp::from_secs(42)).unwrap();
        assert_eq!(json, "42");
    }
}
