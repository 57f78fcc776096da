//! Recording handle handed to packet and radio event sources.

use std::sync::Arc;

use relaywatch_types::{
    packet_type_key, PacketRecord, AVG_LENGTH, AVG_RSSI, AVG_SCORE, AVG_SNR, DROP_COUNT,
    NOISE_FLOOR, PACKET_TYPE, RX_COUNT, TX_COUNT,
};

use crate::history::HistoryLog;
use crate::ingest::Ingestor;

/// A cheap, cloneable handle for recording relay metrics.
///
/// Obtain one from [`RelayStats::recorder`](crate::RelayStats::recorder).
/// Nothing here returns an error: invalid samples are counted as drops.
///
/// # Example
///
/// ```rust
/// use relaywatch_sdk::RelayStats;
/// use relaywatch_types::PacketRecord;
///
/// let stats = RelayStats::builder().build().unwrap();
/// let recorder = stats.recorder();
///
/// // A forwarded advert heard at -92 dBm
/// recorder.record_packet(&PacketRecord::new(4).signal(-92.0, 7.5).transmitted(true));
///
/// // A periodic radio reading
/// recorder.record_noise_floor(-110.5, None);
/// ```
#[derive(Debug, Clone)]
pub struct Recorder {
    pub(crate) ingestor: Arc<Ingestor>,
    pub(crate) noise: Arc<HistoryLog>,
}

impl Recorder {
    /// Record an arbitrary sample.
    pub fn record(&self, name: &str, value: f64, sub_key: Option<&str>, timestamp: Option<f64>) {
        self.ingestor.record(name, value, sub_key, timestamp);
    }

    /// Record a gauge reading now.
    pub fn record_gauge(&self, name: &str, value: f64) {
        self.ingestor.record(name, value, None, None);
    }

    /// Count one event now.
    pub fn increment(&self, name: &str, sub_key: Option<&str>) {
        self.ingestor.record(name, 1.0, sub_key, None);
    }

    /// Fan one packet out into the counter and signal series.
    ///
    /// Every series gets the same timestamp: the packet's own, or now.
    pub fn record_packet(&self, packet: &PacketRecord) {
        let ts = Some(packet.timestamp.unwrap_or_else(|| self.ingestor.now()));

        self.ingestor.record(RX_COUNT, 1.0, None, ts);
        let outcome = if packet.transmitted { TX_COUNT } else { DROP_COUNT };
        self.ingestor.record(outcome, 1.0, None, ts);

        let type_key = packet_type_key(packet.packet_type);
        self.ingestor.record(PACKET_TYPE, 1.0, Some(&type_key), ts);

        let gauges = [
            (AVG_RSSI, packet.rssi),
            (AVG_SNR, packet.snr),
            (AVG_LENGTH, packet.length),
            (AVG_SCORE, packet.score),
        ];
        for (name, value) in gauges {
            if let Some(value) = value {
                self.ingestor.record(name, value, None, ts);
            }
        }
    }

    /// Record a noise-floor reading in dBm into both the rollup store and
    /// the durable history.
    pub fn record_noise_floor(&self, dbm: f64, timestamp: Option<f64>) {
        let ts = timestamp.unwrap_or_else(|| self.ingestor.now());
        self.ingestor.record(NOISE_FLOOR, dbm, None, Some(ts));
        // the ingestor already counted the drop
        if self.ingestor.accepts(NOISE_FLOOR, dbm, ts) {
            self.noise.append(dbm, Some(ts));
        }
    }
}
