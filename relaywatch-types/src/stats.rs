//! Scalar statistics over a time window.

use crate::Bucket;

/// Summary of the samples inside a window.
///
/// `average`, `min` and `max` are absent for an empty window; `std_dev` is
/// the sample standard deviation and is absent below two samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowStats {
    /// Number of samples.
    pub count: u64,
    /// Arithmetic mean.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub average: Option<f64>,
    /// Smallest sample.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub min: Option<f64>,
    /// Largest sample.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub max: Option<f64>,
    /// Sample standard deviation, `sqrt(sum((v - avg)^2) / (n - 1))`.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub std_dev: Option<f64>,
}

impl WindowStats {
    /// Statistics of an empty window.
    pub const EMPTY: WindowStats = WindowStats {
        count: 0,
        average: None,
        min: None,
        max: None,
        std_dev: None,
    };

    /// Compute statistics in a single pass over raw values.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut acc = StatsAccumulator::default();
        for v in values {
            acc.push(v);
        }
        acc.finish()
    }

    /// Compute statistics from bucket aggregates.
    ///
    /// Gives the same result as [`from_values`](Self::from_values) over the
    /// samples the buckets were built from.
    pub fn from_buckets<'a>(buckets: impl IntoIterator<Item = &'a Bucket>) -> Self {
        let mut acc = StatsAccumulator::default();
        for b in buckets {
            acc.merge_bucket(b);
        }
        acc.finish()
    }

    /// Whether the window held no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Running mean/variance accumulator (Welford, with Chan's merge for
/// pre-aggregated buckets).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl StatsAccumulator {
    /// Add one sample.
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Add every sample summarised by `bucket`.
    pub fn merge_bucket(&mut self, bucket: &Bucket) {
        if bucket.count == 0 {
            return;
        }
        let n_b = bucket.count as f64;
        let mean_b = bucket.sum / n_b;
        let m2_b = (bucket.sum_sq - bucket.sum * mean_b).max(0.0);

        if self.count == 0 {
            self.min = bucket.min;
            self.max = bucket.max;
            self.count = bucket.count;
            self.mean = mean_b;
            self.m2 = m2_b;
            return;
        }

        let n_a = self.count as f64;
        let total = n_a + n_b;
        let delta = mean_b - self.mean;
        self.mean += delta * n_b / total;
        self.m2 += m2_b + delta * delta * n_a * n_b / total;
        self.count += bucket.count;
        self.min = self.min.min(bucket.min);
        self.max = self.max.max(bucket.max);
    }

    /// Produce the summary.
    pub fn finish(&self) -> WindowStats {
        match self.count {
            0 => WindowStats::EMPTY,
            n => WindowStats {
                count: n,
                average: Some(self.mean),
                min: Some(self.min),
                max: Some(self.max),
                std_dev: (n >= 2).then(|| (self.m2 / (n - 1) as f64).sqrt()),
            },
        }
    }
}
