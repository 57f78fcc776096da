//! # relaywatch
//!
//! The relay monitoring daemon: configuration, the NDJSON event feed, and
//! wiring of the [`relaywatch_sdk`] engine to its HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the dashboard API on :8000 and accept events on 127.0.0.1:7878
//! relaywatch --storage-dir /var/lib/relaywatch
//!
//! # Write the last six hours of every endpoint to a file and exit
//! relaywatch --storage-dir /var/lib/relaywatch --export dashboard.json --hours 6
//! ```
//!
//! ## Configuration
//!
//! Settings come from an optional file (`--config relaywatch.toml`) and
//! `RELAYWATCH_` environment variables, see [`Settings`].

pub mod config;
pub mod duration;
pub mod feed;

pub use config::Settings;
pub use feed::{FeedEvent, FeedSummary};
