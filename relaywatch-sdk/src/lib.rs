//! # relaywatch-sdk
//!
//! Time-series ingestion, rollup and query engine behind the relay
//! monitoring dashboard.
//!
//! Samples are recorded through a [`Recorder`], queued, and applied to
//! multi-resolution ring archives in a [`RollupStore`]. The noise floor is
//! also kept at full fidelity in a [`HistoryLog`]. Reads go through a
//! [`QueryEngine`] or the endpoint-shaped [`Dashboard`].
//!
//! ## Quick Start
//!
//! ```rust
//! use relaywatch_sdk::{Clock, ManualClock, RelayStats};
//! use relaywatch_types::{PacketRecord, SeriesKey, RX_COUNT};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::new(1_700_000_000.0));
//! let stats = RelayStats::builder().clock(clock.clone()).build().unwrap();
//!
//! let recorder = stats.recorder();
//! recorder.record_packet(&PacketRecord::new(4).signal(-92.0, 6.5).transmitted(true));
//! recorder.record_noise_floor(-110.5, None);
//!
//! // apply queued samples and run rollups
//! stats.run_maintenance();
//!
//! let now = clock.now();
//! let total = stats.query().total(&SeriesKey::new(RX_COUNT), now - 3600.0, now);
//! assert_eq!(total, 1.0);
//!
//! let response = stats.dashboard().handle("packet_stats", &Default::default());
//! assert_eq!(response["data"]["transmitted_packets"], 1);
//! ```
//!
//! ## Features
//!
//! - **Lossless rollups**: buckets keep count, sum, min, max and last, so any
//!   consolidation can be read back at any level
//! - **Late data**: samples older than the finest archive land in the finest
//!   level that still covers them
//! - **Bounded memory**: fixed-size archives and a bounded ingest queue that
//!   drops the oldest sample when full
//! - **Durable history**: the noise floor is appended to an NDJSON file and
//!   pruned by age
//! - **Background maintenance** (`tokio` feature): periodic drain, rollup,
//!   prune and snapshot
//! - **HTTP API** (`http` feature): the dashboard endpoints over hyper

mod archive;
mod clock;
mod dashboard;
mod error;
mod format;
mod history;
mod ingest;
mod persist;
mod query;
mod radio;
mod recorder;
mod relay_stats;
mod series;
mod store;

#[cfg(feature = "http")]
pub mod api;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dashboard::{Dashboard, RawQuery, DEFAULT_HOURS, ENDPOINTS};
pub use error::{Result, StatsError};
pub use history::{HistoryLog, DEFAULT_PRUNE_EVERY, DEFAULT_RETENTION_SECS};
pub use ingest::{DropStats, RollupMode, Sample, DRAIN_BATCH};
pub use persist::{load_snapshot, save_snapshot};
pub use query::QueryEngine;
pub use radio::{noise_floor_dbm, sample_noise_floor, NoiseFloorSource};
pub use recorder::Recorder;
pub use relay_stats::{
    MaintenanceReport, RelayStats, RelayStatsBuilder, DEFAULT_MAINTENANCE_INTERVAL,
    DEFAULT_MAX_FUTURE_SKEW, DEFAULT_QUEUE_CAPACITY, NOISE_FLOOR_FILE, STORE_FILE,
};
pub use series::{Series, SeriesWindow, Update};
pub use store::{validate_spec, RollupStore};

#[cfg(feature = "tokio")]
pub use persist::save_snapshot_async;
#[cfg(feature = "tokio")]
pub use radio::spawn_sampler;
#[cfg(feature = "tokio")]
pub use relay_stats::MaintenanceHandle;

// Re-export types for convenience
pub use relaywatch_types::{
    ArchiveSpec, Bounds, Bucket, Consolidation, HistoryRecord, PacketRecord, Point, SeriesKey,
    SeriesSpec, StoreSnapshot, WindowStats,
};
