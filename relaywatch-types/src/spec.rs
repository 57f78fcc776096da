//! Archive and series configuration.

use crate::Consolidation;

/// Step of the default fine archive: one minute.
pub const DEFAULT_FINE_STEP_SECS: u64 = 60;

/// Bucket count of the default fine archive: 24 hours of minutes.
pub const DEFAULT_FINE_BUCKETS: usize = 1440;

/// Step of the default coarse archive: one hour.
pub const DEFAULT_COARSE_STEP_SECS: u64 = 3600;

/// Bucket count of the default coarse archive: 7 days of hours.
pub const DEFAULT_COARSE_BUCKETS: usize = 168;

/// One resolution tier of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveSpec {
    /// Width of every bucket, in seconds.
    pub step_secs: u64,
    /// Maximum number of buckets retained.
    pub buckets: usize,
}

impl ArchiveSpec {
    /// Create an archive spec.
    pub const fn new(step_secs: u64, buckets: usize) -> Self {
        Self { step_secs, buckets }
    }

    /// Time span covered by a full archive, in seconds.
    pub const fn span_secs(&self) -> u64 {
        self.step_secs * self.buckets as u64
    }
}

/// Inclusive value range accepted by a series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Smallest accepted value; `None` means unbounded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min: Option<f64>,
    /// Largest accepted value; `None` means unbounded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max: Option<f64>,
}

impl Bounds {
    /// Accept any finite value.
    pub const UNBOUNDED: Bounds = Bounds {
        min: None,
        max: None,
    };

    /// Accept values in `[min, max]`.
    pub const fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Accept values `>= min`.
    pub const fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Whether `value` is finite and inside the range.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && self.min.map_or(true, |min| value >= min)
            && self.max.map_or(true, |max| value <= max)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Configuration a series is created with.
///
/// Archives are ordered finest first. Validation of the ladder happens when
/// the spec is registered with the engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesSpec {
    /// How samples are folded into buckets.
    pub consolidation: Consolidation,
    /// Resolution tiers, finest first.
    pub archives: Vec<ArchiveSpec>,
    /// Values outside these bounds are rejected on ingest.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bounds: Bounds,
}

impl SeriesSpec {
    /// A spec with the given consolidation function and no archives.
    pub fn new(consolidation: Consolidation) -> Self {
        Self {
            consolidation,
            archives: Vec::new(),
            bounds: Bounds::UNBOUNDED,
        }
    }

    /// A spec using the default 1-minute/24h and 1-hour/7d ladder.
    pub fn with_default_ladder(consolidation: Consolidation) -> Self {
        Self::new(consolidation)
            .archive(DEFAULT_FINE_STEP_SECS, DEFAULT_FINE_BUCKETS)
            .archive(DEFAULT_COARSE_STEP_SECS, DEFAULT_COARSE_BUCKETS)
    }

    /// Append an archive (coarser than the ones already present).
    pub fn archive(mut self, step_secs: u64, buckets: usize) -> Self {
        self.archives.push(ArchiveSpec::new(step_secs, buckets));
        self
    }

    /// Replace the archive ladder.
    pub fn archives(mut self, archives: impl IntoIterator<Item = ArchiveSpec>) -> Self {
        self.archives = archives.into_iter().collect();
        self
    }

    /// Set the accepted value range.
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Longest span any archive retains, in seconds.
    pub fn horizon_secs(&self) -> u64 {
        self.archives.iter().map(ArchiveSpec::span_secs).max().unwrap_or(0)
    }
}

impl Default for SeriesSpec {
    fn default() -> Self {
        Self::with_default_ladder(Consolidation::Average)
    }
}
