//! Bucket aggregates and consolidated points.

use crate::Consolidation;

/// Start of the `step`-aligned window containing `ts`.
///
/// Works for negative timestamps too (floors towards minus infinity).
pub fn align(ts: f64, step_secs: u64) -> i64 {
    let step = step_secs.max(1) as i64;
    (ts.floor() as i64).div_euclid(step) * step
}

/// Start of the `step`-aligned window containing the instant `start`.
pub fn align_start(start: i64, step_secs: u64) -> i64 {
    let step = step_secs.max(1) as i64;
    start.div_euclid(step) * step
}

/// Aggregates of every sample that fell into one time window.
///
/// All aggregates are kept whatever the consolidation function is, so a
/// bucket can be merged into a coarser one without losing precision and the
/// consolidated value is derived on read.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bucket {
    /// Window start, epoch seconds, aligned to the archive step.
    pub start: i64,
    /// Number of samples folded in.
    pub count: u64,
    /// Sum of sample values.
    pub sum: f64,
    /// Sum of squared sample values.
    pub sum_sq: f64,
    /// Smallest sample value.
    pub min: f64,
    /// Largest sample value.
    pub max: f64,
    /// Value of the sample with the greatest timestamp.
    pub last: f64,
    /// Timestamp of `last`, epoch seconds.
    pub last_ts: f64,
}

impl Bucket {
    /// A bucket holding exactly one sample.
    pub fn from_sample(start: i64, value: f64, ts: f64) -> Self {
        Self {
            start,
            count: 1,
            sum: value,
            sum_sq: value * value,
            min: value,
            max: value,
            last: value,
            last_ts: ts,
        }
    }

    /// Fold one sample into the bucket.
    pub fn add(&mut self, value: f64, ts: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if ts >= self.last_ts {
            self.last = value;
            self.last_ts = ts;
        }
    }

    /// Fold another bucket's aggregates into this one. `start` is kept.
    pub fn merge(&mut self, other: &Bucket) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        if other.last_ts >= self.last_ts {
            self.last = other.last;
            self.last_ts = other.last_ts;
        }
    }

    /// Copy of the aggregates re-keyed to a different window start.
    pub fn rebased(&self, start: i64) -> Self {
        Self { start, ..*self }
    }

    /// Consolidated value under `cf`.
    pub fn value(&self, cf: Consolidation) -> f64 {
        match cf {
            Consolidation::Average => {
                if self.count == 0 {
                    0.0
                } else {
                    self.sum / self.count as f64
                }
            }
            Consolidation::Sum => self.sum,
            Consolidation::Min => self.min,
            Consolidation::Max => self.max,
            Consolidation::Last => self.last,
        }
    }

    /// The consolidated point for this bucket.
    pub fn point(&self, cf: Consolidation) -> Point {
        Point {
            start: self.start,
            value: self.value(cf),
        }
    }
}

/// One consolidated bucket value, as returned by series queries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Bucket start, epoch seconds.
    pub start: i64,
    /// Consolidated value.
    pub value: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(start: i64, value: f64) -> Self {
        Self { start, value }
    }

    /// Bucket start in epoch milliseconds, as used by chart arrays.
    pub const fn start_ms(&self) -> i64 {
        self.start * 1000
    }
}
