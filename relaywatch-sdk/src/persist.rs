//! Saving and loading rollup store snapshots.
//!
//! Snapshots are written as JSON to a temporary file next to the target and
//! renamed over it, so a crash mid-write leaves the previous file intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use relaywatch_types::{Compatibility, StoreSnapshot};

use crate::error::Result;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` to `path`.
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(snapshot)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write `snapshot` to `path` without blocking the runtime.
#[cfg(feature = "tokio")]
pub async fn save_snapshot_async(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec(snapshot)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read the snapshot at `path`.
///
/// A missing file or one written with an incompatible schema version gives
/// `Ok(None)`.
pub fn load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
    match snapshot.version.compatibility() {
        Compatibility::Current | Compatibility::OlderMinor => {}
        Compatibility::NewerMinor => tracing::info!(
            path = %path.display(),
            version = %snapshot.version,
            "store snapshot written by a newer schema revision, unknown fields dropped"
        ),
        Compatibility::Incompatible => {
            tracing::warn!(
                path = %path.display(),
                version = %snapshot.version,
                "ignoring store snapshot with incompatible schema version"
            );
            return Ok(None);
        }
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use relaywatch_types::{SchemaVersion, SeriesDump, SeriesKey, SeriesSpec};

    fn snapshot() -> StoreSnapshot {
        StoreSnapshot::builder()
            .saved_at(1_000.0)
            .series(SeriesDump::new(SeriesKey::new("rx_count"), SeriesSpec::default()))
            .build()
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rollup_store.json");

        save_snapshot(&path, &snapshot()).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn incompatible_version_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let mut old = snapshot();
        old.version = SchemaVersion::new(0, 3);
        save_snapshot(&path, &old).unwrap();

        assert!(load_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn newer_minor_revision_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newer.json");
        let mut newer = snapshot();
        newer.version = SchemaVersion::new(newer.version.major, newer.version.minor + 1);
        save_snapshot(&path, &newer).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.series, snapshot().series);
    }

    #[test]
    fn garbage_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_snapshot(&path), Err(StatsError::Json(_))));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn async_save_matches_sync_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollup_store.json");

        save_snapshot_async(&path, &snapshot()).await.unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), Some(snapshot()));
    }
}
