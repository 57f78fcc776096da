//! Registry of every series in the rollup store.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use relaywatch_types::{SeriesKey, SeriesSpec, StoreSnapshot};

use crate::error::{Result, StatsError};
use crate::series::{Series, SeriesWindow};

/// Check that a spec describes a usable archive ladder.
///
/// The ladder must be non-empty, every step and bucket count non-zero, steps
/// strictly increasing, and each step an integer multiple of the one below.
/// No archive may retain less time than the one below it.
pub fn validate_spec(name: &str, spec: &SeriesSpec) -> Result<()> {
    if spec.archives.is_empty() {
        return Err(StatsError::invalid_spec(name, "no archives"));
    }
    for (i, archive) in spec.archives.iter().enumerate() {
        if archive.step_secs == 0 {
            return Err(StatsError::invalid_spec(name, format!("archive {i} has a zero step")));
        }
        if archive.buckets == 0 {
            return Err(StatsError::invalid_spec(name, format!("archive {i} has no buckets")));
        }
    }
    for (i, pair) in spec.archives.windows(2).enumerate() {
        let (fine, coarse) = (pair[0].step_secs, pair[1].step_secs);
        if coarse <= fine {
            return Err(StatsError::invalid_spec(
                name,
                format!("archive {} step {coarse}s is not coarser than {fine}s", i + 1),
            ));
        }
        if coarse % fine != 0 {
            return Err(StatsError::invalid_spec(
                name,
                format!("archive {} step {coarse}s is not a multiple of {fine}s", i + 1),
            ));
        }
        let (fine_span, coarse_span) = (pair[0].span_secs(), pair[1].span_secs());
        if coarse_span < fine_span {
            return Err(StatsError::invalid_spec(
                name,
                format!("archive {} retains {coarse_span}s, less than the {fine_span}s below it", i + 1),
            ));
        }
    }
    if let (Some(min), Some(max)) = (spec.bounds.min, spec.bounds.max) {
        if min > max {
            return Err(StatsError::invalid_spec(name, format!("bounds {min} > {max}")));
        }
    }
    Ok(())
}

/// All series, each behind its own lock.
///
/// Lookups take the registry read lock only long enough to clone the series
/// `Arc`; updates to different series never contend.
#[derive(Debug)]
pub struct RollupStore {
    series: RwLock<BTreeMap<SeriesKey, Arc<Mutex<Series>>>>,
    specs: RwLock<BTreeMap<String, SeriesSpec>>,
    default_spec: SeriesSpec,
}

impl RollupStore {
    /// Empty store; unregistered names get `default_spec`.
    pub fn new(default_spec: SeriesSpec) -> Result<Self> {
        validate_spec("<default>", &default_spec)?;
        Ok(Self {
            series: RwLock::new(BTreeMap::new()),
            specs: RwLock::new(BTreeMap::new()),
            default_spec,
        })
    }

    /// Register the spec used for every series named `name`.
    ///
    /// Series that already exist keep the spec they were created with.
    pub fn register(&self, name: &str, spec: SeriesSpec) -> Result<()> {
        validate_spec(name, &spec)?;
        self.specs.write().insert(name.to_string(), spec);
        Ok(())
    }

    /// Spec a new series named `name` would get.
    pub fn spec_for(&self, name: &str) -> SeriesSpec {
        self.specs
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_spec.clone())
    }

    /// The series for `key`, if it has ever been written.
    pub fn get(&self, key: &SeriesKey) -> Option<Arc<Mutex<Series>>> {
        self.series.read().get(key).cloned()
    }

    /// The series for `key`, created on first use.
    pub fn get_or_create(&self, key: &SeriesKey) -> Arc<Mutex<Series>> {
        // Fast path: check if it exists
        if let Some(series) = self.get(key) {
            return series;
        }

        // Slow path: create it
        let spec = self.spec_for(&key.name);
        let mut series = self.series.write();
        series
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Series::new(spec))))
            .clone()
    }

    /// Every key, ordered.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.series.read().keys().cloned().collect()
    }

    /// Sub-keys in use under `name`.
    pub fn sub_keys(&self, name: &str) -> Vec<String> {
        self.series
            .read()
            .keys()
            .filter(|k| k.name == name)
            .filter_map(|k| k.sub_key.clone())
            .collect()
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    /// Whether no series exist yet.
    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }

    /// Copy out a window of one series; unknown keys give an empty window.
    pub fn window(
        &self,
        key: &SeriesKey,
        from: f64,
        to: f64,
        resolution: Option<u64>,
    ) -> SeriesWindow {
        match self.get(key) {
            Some(series) => series.lock().window(from, to, resolution),
            None => {
                let spec = self.spec_for(&key.name);
                let step = spec.archives.first().map_or(0, |a| a.step_secs);
                SeriesWindow::empty(spec.consolidation, step)
            }
        }
    }

    /// Propagate every finalized bucket of every series.
    ///
    /// Each series lock is taken once per propagated bucket, so writers are
    /// never held up for a whole pass.
    pub fn rollup_all(&self, now: f64) -> usize {
        let all: Vec<_> = self.series.read().values().cloned().collect();
        let mut total = 0;
        for series in all {
            while series.lock().rollup_one(now) {
                total += 1;
            }
        }
        total
    }

    /// Capture every series.
    pub fn snapshot(&self, saved_at: f64) -> StoreSnapshot {
        let all: Vec<_> = self
            .series
            .read()
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        let mut builder = StoreSnapshot::builder().saved_at(saved_at);
        for (key, series) in all {
            let dump = series.lock().dump(key);
            builder = builder.series(dump);
        }
        builder.build()
    }

    /// Load series from a snapshot, replacing any existing series with the
    /// same key. Series whose spec differs from the one now configured are
    /// skipped. Returns the number restored.
    pub fn restore(&self, snapshot: &StoreSnapshot) -> usize {
        let mut restored = 0;
        for dump in &snapshot.series {
            let spec = self.spec_for(&dump.key.name);
            if spec != dump.spec {
                tracing::warn!(series = %dump.key, "stored spec differs from configuration, skipping");
                continue;
            }
            let series = Arc::new(Mutex::new(Series::restore(dump)));
            self.series.write().insert(dump.key.clone(), series);
            restored += 1;
        }
        restored
    }
}
