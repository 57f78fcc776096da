//! Newline-delimited JSON event feed.
//!
//! The packet dispatcher and radio driver push one JSON object per line:
//!
//! ```text
//! {"event":"packet","type":4,"rssi":-92.0,"snr":6.5,"transmitted":true}
//! {"event":"noise_floor","dbm":-111.5}
//! {"event":"noise_floor_raw","raw":223,"timestamp":1700000000.0}
//! {"event":"gauge","name":"neighbor_count","value":7}
//! {"event":"sample","series":"packet_type","sub_key":"4","value":1}
//! ```
//!
//! Malformed lines are logged and skipped.

use relaywatch_sdk::{noise_floor_dbm, PacketRecord, Recorder};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A packet seen by the relay.
    Packet(PacketRecord),
    /// A noise-floor reading already converted to dBm.
    NoiseFloor {
        /// Reading in dBm.
        dbm: f64,
        /// Epoch seconds; now when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    /// A raw noise-floor register value.
    NoiseFloorRaw {
        /// Register value; dBm is `-(raw / 2)`.
        raw: i32,
        /// Epoch seconds; now when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    /// A gauge reading.
    Gauge {
        /// Series name.
        name: String,
        /// Reading.
        value: f64,
        /// Epoch seconds; now when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
    /// Any sample, optionally under a sub-key.
    Sample {
        /// Series name.
        series: String,
        /// Category within the series.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_key: Option<String>,
        /// Value.
        value: f64,
        /// Epoch seconds; now when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },
}

impl FeedEvent {
    /// Hand the event to `recorder`.
    pub fn apply(&self, recorder: &Recorder) {
        match self {
            FeedEvent::Packet(packet) => recorder.record_packet(packet),
            FeedEvent::NoiseFloor { dbm, timestamp } => recorder.record_noise_floor(*dbm, *timestamp),
            FeedEvent::NoiseFloorRaw { raw, timestamp } => {
                recorder.record_noise_floor(noise_floor_dbm(*raw), *timestamp)
            }
            FeedEvent::Gauge {
                name,
                value,
                timestamp,
            } => recorder.record(name, *value, None, *timestamp),
            FeedEvent::Sample {
                series,
                sub_key,
                value,
                timestamp,
            } => recorder.record(series, *value, sub_key.as_deref(), *timestamp),
        }
    }
}

/// Line counts of one feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSummary {
    /// Events handed to the recorder.
    pub applied: u64,
    /// Lines that did not parse.
    pub malformed: u64,
}

/// Read events from `reader` until EOF and record them.
///
/// ```
/// use relaywatch::feed::ingest;
/// use relaywatch_sdk::RelayStats;
///
/// # tokio_test::block_on(async {
/// let stats = RelayStats::builder().build().unwrap();
/// let lines = b"{\"event\":\"noise_floor\",\"dbm\":-110.0}\nnot json\n";
///
/// let summary = ingest(&lines[..], &stats.recorder()).await.unwrap();
/// assert_eq!((summary.applied, summary.malformed), (1, 1));
/// # });
/// ```
pub async fn ingest<R>(reader: R, recorder: &Recorder) -> std::io::Result<FeedSummary>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut summary = FeedSummary::default();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(summary);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<FeedEvent>(trimmed) {
            Ok(event) => {
                event.apply(recorder);
                summary.applied += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed feed line");
                summary.malformed += 1;
            }
        }
    }
}

/// Accept feed connections on `listener` and ingest each in its own task.
pub async fn serve(listener: TcpListener, recorder: Recorder) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "event feed listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let recorder = recorder.clone();
        tokio::spawn(async move {
            tracing::debug!(%peer, "feed connected");
            match ingest(stream, &recorder).await {
                Ok(summary) => tracing::debug!(
                    %peer,
                    applied = summary.applied,
                    malformed = summary.malformed,
                    "feed closed"
                ),
                Err(e) => tracing::warn!(%peer, error = %e, "feed read error"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaywatch_sdk::{ManualClock, RelayStats, SeriesKey};
    use std::sync::Arc;

    const NOW: f64 = 1_700_000_000.0;

    fn stats() -> RelayStats {
        RelayStats::builder()
            .clock(Arc::new(ManualClock::new(NOW)))
            .build()
            .unwrap()
    }

    #[test]
    fn events_parse_from_tagged_json() {
        let packet: FeedEvent =
            serde_json::from_str(r#"{"event":"packet","type":2,"rssi":-80.0,"snr":4.0}"#).unwrap();
        assert_eq!(packet, FeedEvent::Packet(PacketRecord::new(2).signal(-80.0, 4.0)));

        let raw: FeedEvent = serde_json::from_str(r#"{"event":"noise_floor_raw","raw":221}"#).unwrap();
        assert_eq!(
            raw,
            FeedEvent::NoiseFloorRaw {
                raw: 221,
                timestamp: None
            }
        );

        assert!(serde_json::from_str::<FeedEvent>(r#"{"event":"reboot"}"#).is_err());
    }

    #[tokio::test]
    async fn ingest_records_every_event_kind() {
        let stats = stats();
        let lines = format!(
            "{}\n{}\n\n{}\n{}\n{}\n{{broken\n",
            r#"{"event":"packet","type":4,"transmitted":true,"timestamp":1699999990.0}"#,
            r#"{"event":"noise_floor","dbm":-110.0,"timestamp":1699999990.0}"#,
            r#"{"event":"noise_floor_raw","raw":220,"timestamp":1699999995.0}"#,
            r#"{"event":"gauge","name":"neighbor_count","value":7,"timestamp":1699999990.0}"#,
            r#"{"event":"sample","series":"packet_type","sub_key":"4","value":1,"timestamp":1699999991.0}"#,
        );

        let summary = ingest(lines.as_bytes(), &stats.recorder()).await.unwrap();
        assert_eq!(summary, FeedSummary { applied: 5, malformed: 1 });
        stats.run_maintenance();

        let query = stats.query();
        let hour_ago = NOW - 3600.0;
        assert_eq!(query.total(&SeriesKey::new("tx_count"), hour_ago, NOW), 1.0);
        assert_eq!(query.total(&SeriesKey::packet_type(4), hour_ago, NOW), 2.0);
        assert_eq!(
            query.average(&SeriesKey::new("neighbor_count"), hour_ago, NOW),
            Some(7.0)
        );
        let noise = query.history_stats(hour_ago, NOW);
        assert_eq!(noise.count, 2);
        assert_eq!(noise.average, Some(-110.0));
    }

    #[tokio::test]
    async fn serve_accepts_connections() {
        use tokio::io::AsyncWriteExt;

        let stats = stats();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, stats.recorder()));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"{\"event\":\"noise_floor\",\"dbm\":-105.0,\"timestamp\":1699999999.0}\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        // the connection task records asynchronously
        for _ in 0..100 {
            if !stats.noise_floor_log().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        server.abort();
        assert_eq!(stats.noise_floor_log().len(), 1);
    }
}
