//! Read-only queries over the rollup store and the noise-floor history.

use std::collections::BTreeMap;
use std::sync::Arc;

use relaywatch_types::{
    Consolidation, HistoryRecord, Point, SeriesKey, WindowStats, NOISE_FLOOR,
};

use crate::history::HistoryLog;
use crate::series::SeriesWindow;
use crate::store::RollupStore;

/// Answers chart, statistics and categorical queries.
///
/// Every method copies what it needs out of the store and returns owned
/// data. Unknown series and inverted windows give empty or zero results.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<RollupStore>,
    noise: Arc<HistoryLog>,
}

impl QueryEngine {
    pub(crate) fn new(store: Arc<RollupStore>, noise: Arc<HistoryLog>) -> Self {
        Self { store, noise }
    }

    /// Buckets of one series overlapping `[from, to]`.
    pub fn series_window(
        &self,
        key: &SeriesKey,
        from: f64,
        to: f64,
        resolution: Option<u64>,
    ) -> SeriesWindow {
        self.store.window(key, from, to, resolution)
    }

    /// Consolidated points of one series, oldest first. `cf` overrides the
    /// series' own consolidation function.
    pub fn chart_series(
        &self,
        key: &SeriesKey,
        from: f64,
        to: f64,
        resolution: Option<u64>,
        cf: Option<Consolidation>,
    ) -> Vec<Point> {
        let window = self.series_window(key, from, to, resolution);
        window.points_with(cf.unwrap_or(window.consolidation))
    }

    /// Statistics of one series over `[from, to]`.
    ///
    /// The noise floor is answered from the history log at full fidelity;
    /// everything else from rollup buckets.
    pub fn window_stats(&self, key: &SeriesKey, from: f64, to: f64) -> WindowStats {
        if key.name == NOISE_FLOOR && key.sub_key.is_none() {
            return self.history_stats(from, to);
        }
        self.series_window(key, from, to, None).stats()
    }

    /// Sum of every sample of one series over `[from, to]`.
    pub fn total(&self, key: &SeriesKey, from: f64, to: f64) -> f64 {
        self.series_window(key, from, to, None).total()
    }

    /// Total count per category sub-key of `name` over `[from, to]`.
    ///
    /// Every requested category is present in the result; categories with no
    /// series count zero.
    pub fn category_totals<'a>(
        &self,
        name: &str,
        categories: impl IntoIterator<Item = &'a str>,
        from: f64,
        to: f64,
    ) -> BTreeMap<String, u64> {
        categories
            .into_iter()
            .map(|category| {
                let key = SeriesKey::with_sub(name, category);
                let total = self.total(&key, from, to).max(0.0).round() as u64;
                (category.to_string(), total)
            })
            .collect()
    }

    /// Mean of one series over `[from, to]`, if it has any samples.
    pub fn average(&self, key: &SeriesKey, from: f64, to: f64) -> Option<f64> {
        self.series_window(key, from, to, None).stats().average
    }

    /// Noise-floor records in `[from, to]`.
    pub fn history_range(&self, from: f64, to: f64) -> Vec<HistoryRecord> {
        self.noise.range(from, to)
    }

    /// Noise-floor statistics over `[from, to]`.
    pub fn history_stats(&self, from: f64, to: f64) -> WindowStats {
        self.noise.stats(from, to)
    }

    /// Step of the finest archive configured for series `name`.
    pub fn base_step(&self, name: &str) -> u64 {
        self.store
            .spec_for(name)
            .archives
            .first()
            .map_or(0, |a| a.step_secs)
    }

    /// Every series key that has data.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.store.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use relaywatch_types::{catalogue_spec, SeriesSpec, PACKET_TYPE};

    fn engine() -> QueryEngine {
        let store = Arc::new(RollupStore::new(SeriesSpec::default()).unwrap());
        store.register(PACKET_TYPE, catalogue_spec(PACKET_TYPE)).unwrap();
        let noise = Arc::new(HistoryLog::in_memory(86_400.0, 64, Arc::new(ManualClock::new(0.0))));
        QueryEngine::new(store, noise)
    }

    fn write(engine: &QueryEngine, key: &SeriesKey, value: f64, ts: f64) {
        engine.store.get_or_create(key).lock().update(value, ts);
    }

    #[test]
    fn category_totals_fill_missing_categories_with_zero() {
        let engine = engine();
        for _ in 0..5 {
            write(&engine, &SeriesKey::packet_type(0), 1.0, 100.0);
        }
        write(&engine, &SeriesKey::packet_type(1), 1.0, 200.0);
        write(&engine, &SeriesKey::packet_type(1), 1.0, 3_000.0);

        let totals = engine.category_totals(PACKET_TYPE, ["0", "1", "2"], 0.0, 3_600.0);
        assert_eq!(totals["0"], 5);
        assert_eq!(totals["1"], 2);
        assert_eq!(totals["2"], 0);
    }

    #[test]
    fn inverted_window_is_empty() {
        let engine = engine();
        let key = SeriesKey::new("avg_rssi");
        write(&engine, &key, -80.0, 100.0);

        assert!(engine.chart_series(&key, 200.0, 0.0, None, None).is_empty());
        assert_eq!(engine.window_stats(&key, 200.0, 0.0), WindowStats::EMPTY);
        assert_eq!(engine.category_totals(PACKET_TYPE, ["0"], 10.0, 0.0)["0"], 0);
    }

    #[test]
    fn consolidation_override_applies_on_read() {
        let engine = engine();
        let key = SeriesKey::new("avg_rssi");
        write(&engine, &key, -80.0, 0.0);
        write(&engine, &key, -100.0, 10.0);

        let avg = engine.chart_series(&key, 0.0, 59.0, None, None);
        let max = engine.chart_series(&key, 0.0, 59.0, None, Some(Consolidation::Max));
        assert_eq!(avg, vec![Point::new(0, -90.0)]);
        assert_eq!(max, vec![Point::new(0, -80.0)]);
        assert_eq!(engine.average(&key, 0.0, 59.0), Some(-90.0));
    }

    #[test]
    fn noise_floor_stats_come_from_history() {
        let engine = engine();
        engine.noise.append(-95.0, Some(0.0));
        engine.noise.append(-90.0, Some(60.0));
        // a rollup-only value that history does not have
        write(&engine, &SeriesKey::new(NOISE_FLOOR), -10.0, 30.0);

        let stats = engine.window_stats(&SeriesKey::new(NOISE_FLOOR), 0.0, 120.0);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, Some(-92.5));
        assert_eq!(engine.history_range(0.0, 30.0).len(), 1);
    }
}
