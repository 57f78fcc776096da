//! Persisted form of the rollup store.

use crate::{Bucket, SchemaVersion, SeriesKey, SeriesSpec};

/// Everything needed to rebuild the rollup store after a restart.
///
/// # Example
///
/// ```rust
/// use relaywatch_types::{StoreSnapshot, SeriesDump, SeriesKey, SeriesSpec};
///
/// let snapshot = StoreSnapshot::builder()
///     .saved_at(1_700_000_000.0)
///     .series(SeriesDump::new(SeriesKey::new("rx_count"), SeriesSpec::default()))
///     .build();
///
/// assert!(snapshot.version.is_compatible());
/// assert_eq!(snapshot.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreSnapshot {
    /// Schema version for forward compatibility.
    pub version: SchemaVersion,
    /// Epoch seconds at which the snapshot was taken.
    pub saved_at: f64,
    /// Every series, ordered by key.
    pub series: Vec<SeriesDump>,
}

impl StoreSnapshot {
    /// An empty snapshot taken at `saved_at`.
    pub fn new(saved_at: f64) -> Self {
        Self {
            version: SchemaVersion::current(),
            saved_at,
            series: Vec::new(),
        }
    }

    /// Create a builder.
    pub fn builder() -> StoreSnapshotBuilder {
        StoreSnapshotBuilder::default()
    }

    /// Whether no series were captured.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of series captured.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Look up one series.
    pub fn get(&self, key: &SeriesKey) -> Option<&SeriesDump> {
        self.series.iter().find(|s| &s.key == key)
    }
}

/// Builder for [`StoreSnapshot`].
#[derive(Debug, Default)]
pub struct StoreSnapshotBuilder {
    saved_at: f64,
    series: Vec<SeriesDump>,
}

impl StoreSnapshotBuilder {
    /// Set the capture time.
    pub fn saved_at(mut self, saved_at: f64) -> Self {
        self.saved_at = saved_at;
        self
    }

    /// Add one series.
    pub fn series(mut self, dump: SeriesDump) -> Self {
        self.series.push(dump);
        self
    }

    /// Build the snapshot; series are sorted by key.
    pub fn build(mut self) -> StoreSnapshot {
        self.series.sort_by(|a, b| a.key.cmp(&b.key));
        StoreSnapshot {
            version: SchemaVersion::current(),
            saved_at: self.saved_at,
            series: self.series,
        }
    }
}

/// State of one series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesDump {
    /// Series identity.
    pub key: SeriesKey,
    /// Spec the series was created with.
    pub spec: SeriesSpec,
    /// Newest accepted sample time, epoch seconds.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub latest: Option<f64>,
    /// One entry per archive, finest first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub archives: Vec<ArchiveDump>,
}

impl SeriesDump {
    /// A dump with no data.
    pub fn new(key: SeriesKey, spec: SeriesSpec) -> Self {
        Self {
            key,
            spec,
            latest: None,
            archives: Vec::new(),
        }
    }
}

/// Retained buckets of one archive.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveDump {
    /// Buckets, oldest first.
    pub buckets: Vec<Bucket>,
    /// Starts of buckets not yet rolled into the next archive.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub pending: Vec<i64>,
}
