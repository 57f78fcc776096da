//! # relaywatch-types
//!
//! Core types for radio relay monitoring. This crate defines the data model
//! shared by the relaywatch engine, the daemon, and dashboard clients: series
//! and archive configuration, bucket aggregates, window statistics, the relay
//! metric catalogue, the persisted store layout and the JSON shapes served to
//! the dashboard.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON and friends
//! - **Lossless rollups**: Buckets keep full aggregates so any consolidation can be read back
//! - **Versioned persistence**: Store snapshots include version info for forward compatibility
//!
//! ## Example
//!
//! ```rust
//! use relaywatch_types::{align, Bucket, Consolidation, SeriesSpec, WindowStats};
//!
//! let spec = SeriesSpec::with_default_ladder(Consolidation::Average);
//! let step = spec.archives[0].step_secs;
//!
//! let mut bucket = Bucket::from_sample(align(61.0, step), -95.0, 61.0);
//! bucket.add(-90.0, 75.0);
//!
//! assert_eq!(bucket.start, 60);
//! assert_eq!(bucket.value(Consolidation::Average), -92.5);
//! assert_eq!(WindowStats::from_buckets([&bucket]).count, 2);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. The version is written into persisted
//! store snapshots so older files can be detected and skipped.

mod bucket;
mod consolidation;
mod history;
mod metrics;
mod snapshot;
mod spec;
mod stats;
mod version;
pub mod wire;

pub use bucket::*;
pub use consolidation::*;
pub use history::*;
pub use metrics::*;
pub use snapshot::*;
pub use spec::*;
pub use stats::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the store snapshot format.
pub const SCHEMA_VERSION: u32 = 1;
