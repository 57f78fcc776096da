//! The process-wide stats context and its background maintenance.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use relaywatch_types::{
    catalogue_spec, ArchiveSpec, Consolidation, SeriesSpec, StoreSnapshot, GRAPH_METRICS,
    NOISE_FLOOR, PACKET_TYPE,
};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::dashboard::Dashboard;
use crate::error::{Result, StatsError};
use crate::history::{HistoryLog, DEFAULT_PRUNE_EVERY, DEFAULT_RETENTION_SECS};
use crate::ingest::{DropCounters, DropStats, Ingestor, RollupMode};
use crate::persist;
use crate::query::QueryEngine;
use crate::recorder::Recorder;
use crate::store::RollupStore;

/// Default ingest queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default tolerance for timestamps ahead of the clock.
pub const DEFAULT_MAX_FUTURE_SKEW: Duration = Duration::from_secs(300);

/// Default period of the maintenance loop.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// File name of the noise-floor history inside the storage directory.
pub const NOISE_FLOOR_FILE: &str = "noise_floor.ndjson";

/// File name of the rollup store snapshot inside the storage directory.
pub const STORE_FILE: &str = "rollup_store.json";

/// What one maintenance pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MaintenanceReport {
    /// Queued samples applied.
    pub drained: usize,
    /// Buckets rolled into coarser archives.
    pub rolled_up: usize,
    /// Expired history records dropped.
    pub pruned: usize,
}

/// All relay statistics: rollup store, noise-floor history, ingestor.
///
/// Built once at startup and shared by cloning; every clone refers to the
/// same state.
///
/// # Example
///
/// ```rust,no_run
/// use relaywatch_sdk::RelayStats;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let stats = RelayStats::builder()
///         .storage_dir("/var/lib/relaywatch")
///         .maintenance_interval(Duration::from_secs(30))
///         .build()
///         .unwrap();
///
///     let maintenance = stats.start();
///
///     stats.recorder().record_noise_floor(-112.0, None);
///     println!("{}", stats.dashboard().handle("noise_floor_stats", &Default::default()));
///
///     maintenance.stop();
///     stats.shutdown().unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RelayStats {
    store: Arc<RollupStore>,
    ingestor: Arc<Ingestor>,
    noise: Arc<HistoryLog>,
    drops: Arc<DropCounters>,
    clock: Arc<dyn Clock>,
    snapshot_path: Option<PathBuf>,
    maintenance_interval: Duration,
}

impl RelayStats {
    /// Create a builder.
    pub fn builder() -> RelayStatsBuilder {
        RelayStatsBuilder::new()
    }

    /// Handle for recording samples.
    pub fn recorder(&self) -> Recorder {
        Recorder {
            ingestor: self.ingestor.clone(),
            noise: self.noise.clone(),
        }
    }

    /// Read-only query access.
    pub fn query(&self) -> QueryEngine {
        QueryEngine::new(self.store.clone(), self.noise.clone())
    }

    /// Dashboard endpoints.
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.query(), self.clock.clone())
    }

    /// The rollup store.
    pub fn store(&self) -> &Arc<RollupStore> {
        &self.store
    }

    /// The noise-floor history log.
    pub fn noise_floor_log(&self) -> &Arc<HistoryLog> {
        &self.noise
    }

    /// Samples dropped so far.
    pub fn drops(&self) -> DropStats {
        self.drops.snapshot()
    }

    /// Current time according to the engine clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Where the store snapshot is persisted, if anywhere.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Capture the rollup store.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot(self.clock.now())
    }

    /// Drain the ingest queue, roll up finalized buckets, prune and flush
    /// the history log. Does not write the store snapshot.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let drained = self.ingestor.drain_all();
        let rolled_up = self.store.rollup_all(self.clock.now());
        let pruned = self.noise.prune();
        if !self.noise.is_degraded() {
            // a failed flush degrades the log and is logged there
            let _ = self.noise.flush();
        }
        MaintenanceReport {
            drained,
            rolled_up,
            pruned,
        }
    }

    /// Write the store snapshot now. A no-op without a storage directory.
    pub fn save_snapshot(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => persist::save_snapshot(path, &self.snapshot()),
            None => Ok(()),
        }
    }

    /// Start the background maintenance loop.
    ///
    /// Every interval it runs [`run_maintenance`](Self::run_maintenance) and
    /// writes the store snapshot. Returns a handle that stops the loop.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> MaintenanceHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = self.clone();
        let interval = self.maintenance_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        // history compaction and flushes are blocking file I/O
                        let pass = stats.clone();
                        let report = match tokio::task::spawn_blocking(move || pass.run_maintenance()).await {
                            Ok(report) => report,
                            Err(e) => {
                                tracing::error!(error = %e, "maintenance pass failed");
                                continue;
                            }
                        };
                        tracing::debug!(
                            drained = report.drained,
                            rolled_up = report.rolled_up,
                            pruned = report.pruned,
                            "maintenance pass"
                        );
                        if let Some(path) = &stats.snapshot_path {
                            let snapshot = stats.snapshot();
                            if let Err(e) = persist::save_snapshot_async(path, &snapshot).await {
                                tracing::error!(error = %e, path = %path.display(), "failed to save store snapshot");
                            }
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("maintenance loop stopped");
        });

        MaintenanceHandle { stop_tx }
    }

    /// Apply everything queued, roll up, flush the history log and write
    /// the store snapshot.
    pub fn shutdown(&self) -> Result<()> {
        self.ingestor.drain_all();
        self.store.rollup_all(self.clock.now());
        if let Err(e) = self.noise.flush() {
            tracing::warn!(error = %e, "noise-floor history not flushed");
        }
        self.save_snapshot()?;
        tracing::info!(series = self.store.len(), "relay stats shut down");
        Ok(())
    }
}

/// Handle for stopping the maintenance loop.
///
/// Dropping it stops the loop as well.
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct MaintenanceHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
}

#[cfg(feature = "tokio")]
impl MaintenanceHandle {
    /// Stop background maintenance.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Builder for [`RelayStats`].
#[derive(Debug)]
pub struct RelayStatsBuilder {
    clock: Option<Arc<dyn Clock>>,
    ladder: Option<Vec<ArchiveSpec>>,
    series_specs: Vec<(String, SeriesSpec)>,
    queue_capacity: usize,
    max_future_skew: Duration,
    rollup_mode: RollupMode,
    noise_floor_retention: Duration,
    history_prune_every: usize,
    storage_dir: Option<PathBuf>,
    maintenance_interval: Duration,
}

impl Default for RelayStatsBuilder {
    fn default() -> Self {
        Self {
            clock: None,
            ladder: None,
            series_specs: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_future_skew: DEFAULT_MAX_FUTURE_SKEW,
            rollup_mode: RollupMode::default(),
            noise_floor_retention: Duration::from_secs_f64(DEFAULT_RETENTION_SECS),
            history_prune_every: DEFAULT_PRUNE_EVERY,
            storage_dir: None,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }
}

impl RelayStatsBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time source; the system clock by default.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Archive ladder of the catalogue series and of unregistered names.
    ///
    /// Defaults to 1 minute x 1440 and 1 hour x 168.
    pub fn ladder(mut self, archives: impl IntoIterator<Item = ArchiveSpec>) -> Self {
        self.ladder = Some(archives.into_iter().collect());
        self
    }

    /// Spec for every series named `name`, replacing the catalogue default.
    pub fn series_spec(mut self, name: impl Into<String>, spec: SeriesSpec) -> Self {
        self.series_specs.push((name.into(), spec));
        self
    }

    /// Ingest queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// How far ahead of the clock a sample may be stamped.
    pub fn max_future_skew(mut self, skew: Duration) -> Self {
        self.max_future_skew = skew;
        self
    }

    /// When finalized buckets are rolled up.
    pub fn rollup_mode(mut self, mode: RollupMode) -> Self {
        self.rollup_mode = mode;
        self
    }

    /// How long noise-floor records are kept.
    pub fn noise_floor_retention(mut self, retention: Duration) -> Self {
        self.noise_floor_retention = retention;
        self
    }

    /// Appends between in-memory history prunes.
    pub fn history_prune_every(mut self, appends: usize) -> Self {
        self.history_prune_every = appends;
        self
    }

    /// Directory holding the history log and store snapshot. Without one
    /// nothing is persisted.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Period of the maintenance loop.
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Validate the configuration, reload persisted state and build.
    pub fn build(self) -> Result<RelayStats> {
        if self.queue_capacity == 0 {
            return Err(StatsError::InvalidConfig("queue capacity must be non-zero".into()));
        }
        if self.noise_floor_retention.is_zero() {
            return Err(StatsError::InvalidConfig("noise floor retention must be non-zero".into()));
        }
        if self.maintenance_interval.is_zero() {
            return Err(StatsError::InvalidConfig("maintenance interval must be non-zero".into()));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ladder = self
            .ladder
            .unwrap_or_else(|| SeriesSpec::with_default_ladder(Consolidation::Average).archives);

        let store = RollupStore::new(SeriesSpec::new(Consolidation::Average).archives(ladder.clone()))?;
        for name in GRAPH_METRICS.into_iter().chain([PACKET_TYPE, NOISE_FLOOR]) {
            store.register(name, catalogue_spec(name).archives(ladder.clone()))?;
        }
        for (name, spec) in self.series_specs {
            store.register(&name, spec)?;
        }

        let retention = self.noise_floor_retention.as_secs_f64();
        let (noise, snapshot_path) = match &self.storage_dir {
            Some(dir) => {
                let noise = HistoryLog::open(
                    dir.join(NOISE_FLOOR_FILE),
                    retention,
                    self.history_prune_every,
                    clock.clone(),
                );
                let path = dir.join(STORE_FILE);
                match persist::load_snapshot(&path) {
                    Ok(Some(snapshot)) => {
                        let restored = store.restore(&snapshot);
                        tracing::info!(restored, path = %path.display(), "rollup store restored");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(error = %e, path = %path.display(), "failed to load store snapshot, starting empty");
                    }
                }
                (noise, Some(path))
            }
            None => (
                HistoryLog::in_memory(retention, self.history_prune_every, clock.clone()),
                None,
            ),
        };

        let store = Arc::new(store);
        let drops = Arc::new(DropCounters::default());
        let ingestor = Ingestor::new(
            store.clone(),
            clock.clone(),
            drops.clone(),
            self.queue_capacity,
            self.max_future_skew.as_secs_f64(),
            self.rollup_mode,
        );

        Ok(RelayStats {
            store,
            ingestor: Arc::new(ingestor),
            noise: Arc::new(noise),
            drops,
            clock,
            snapshot_path,
            maintenance_interval: self.maintenance_interval,
        })
    }
}
