//! Daemon settings: an optional config file layered under `RELAYWATCH_`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use relaywatch_sdk::{
    ArchiveSpec, RelayStats, RelayStatsBuilder, RollupMode, DEFAULT_MAINTENANCE_INTERVAL,
    DEFAULT_MAX_FUTURE_SKEW, DEFAULT_PRUNE_EVERY, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETENTION_SECS,
};
use serde::Deserialize;

/// Prefix of environment overrides, e.g. `RELAYWATCH_LISTEN`.
pub const ENV_PREFIX: &str = "RELAYWATCH";

/// Everything the daemon can be configured with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// HTTP address of the dashboard API.
    pub listen: String,
    /// TCP address of the NDJSON event feed; `None` disables it.
    pub feed: Option<String>,
    /// Where history and store snapshots live; in-memory only when unset.
    pub storage_dir: Option<PathBuf>,
    /// Archive ladder shared by the built-in series; empty keeps the default.
    pub ladder: Vec<ArchiveSpec>,
    /// Ingest queue capacity.
    pub queue_capacity: usize,
    /// Tolerance for sample timestamps ahead of the clock.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub max_future_skew: Duration,
    /// When finalized buckets are rolled up.
    pub rollup_mode: RollupMode,
    /// Age after which noise-floor history is pruned.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub noise_floor_retention: Duration,
    /// History appends between opportunistic prunes.
    pub history_prune_every: usize,
    /// Period of the maintenance loop.
    #[serde(deserialize_with = "crate::duration::deserialize")]
    pub maintenance_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            listen: "0.0.0.0:8000".to_string(),
            feed: Some("127.0.0.1:7878".to_string()),
            storage_dir: None,
            ladder: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_future_skew: DEFAULT_MAX_FUTURE_SKEW,
            rollup_mode: RollupMode::default(),
            noise_floor_retention: Duration::from_secs_f64(DEFAULT_RETENTION_SECS),
            history_prune_every: DEFAULT_PRUNE_EVERY,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }
}

impl Settings {
    /// Load settings from `path` (if any) and the environment.
    ///
    /// The file format follows the extension (TOML, YAML, JSON). Top-level
    /// keys map to `RELAYWATCH_<KEY>`, e.g. `RELAYWATCH_STORAGE_DIR`; nested
    /// keys are joined with `__`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?;
        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Engine builder reflecting these settings.
    pub fn stats_builder(&self) -> RelayStatsBuilder {
        let mut builder = RelayStats::builder()
            .queue_capacity(self.queue_capacity)
            .max_future_skew(self.max_future_skew)
            .rollup_mode(self.rollup_mode)
            .noise_floor_retention(self.noise_floor_retention)
            .history_prune_every(self.history_prune_every)
            .maintenance_interval(self.maintenance_interval);
        if !self.ladder.is_empty() {
            builder = builder.ladder(self.ladder.iter().copied());
        }
        if let Some(dir) = &self.storage_dir {
            builder = builder.storage_dir(dir);
        }
        builder
    }
}
