//! Series naming and the relay metric catalogue.

use core::fmt;

use crate::{Bounds, Consolidation, SeriesSpec};

/// Packets received.
pub const RX_COUNT: &str = "rx_count";
/// Packets forwarded.
pub const TX_COUNT: &str = "tx_count";
/// Packets received but not forwarded.
pub const DROP_COUNT: &str = "drop_count";
/// Received signal strength, dBm.
pub const AVG_RSSI: &str = "avg_rssi";
/// Signal to noise ratio, dB.
pub const AVG_SNR: &str = "avg_snr";
/// Packet length, bytes.
pub const AVG_LENGTH: &str = "avg_length";
/// Routing score, 0..1.
pub const AVG_SCORE: &str = "avg_score";
/// Number of known neighbours.
pub const NEIGHBOR_COUNT: &str = "neighbor_count";
/// Per packet-type counters; the sub-key is the type id.
pub const PACKET_TYPE: &str = "packet_type";
/// Ambient RF noise floor, dBm.
pub const NOISE_FLOOR: &str = "noise_floor";

/// Metrics served by the metrics graph, in display order.
pub const GRAPH_METRICS: [&str; 8] = [
    RX_COUNT,
    TX_COUNT,
    DROP_COUNT,
    AVG_RSSI,
    AVG_SNR,
    AVG_LENGTH,
    AVG_SCORE,
    NEIGHBOR_COUNT,
];

/// Number of packet types with their own counter (`0..=15`).
pub const KNOWN_PACKET_TYPES: u32 = 16;

/// Sub-key of the catch-all packet-type counter.
pub const OTHER_PACKET_TYPE: &str = "other";

/// Every packet-type sub-key, in display order.
pub const PACKET_TYPE_KEYS: [&str; 17] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
    OTHER_PACKET_TYPE,
];

/// Human-readable name of a catalogue metric.
pub fn metric_display_name(name: &str) -> Option<&'static str> {
    Some(match name {
        RX_COUNT => "Received Packets",
        TX_COUNT => "Transmitted Packets",
        DROP_COUNT => "Dropped Packets",
        AVG_RSSI => "Average RSSI (dBm)",
        AVG_SNR => "Average SNR (dB)",
        AVG_LENGTH => "Average Packet Length",
        AVG_SCORE => "Average Score",
        NEIGHBOR_COUNT => "Neighbor Count",
        NOISE_FLOOR => "Noise Floor (dBm)",
        _ => return None,
    })
}

/// Sub-key a packet type is counted under.
pub fn packet_type_key(packet_type: u32) -> String {
    if packet_type < KNOWN_PACKET_TYPES {
        packet_type.to_string()
    } else {
        OTHER_PACKET_TYPE.to_string()
    }
}

/// Human-readable name of a packet-type sub-key.
pub fn packet_type_name(key: &str) -> Option<&'static str> {
    Some(match key {
        "0" => "Request (REQ)",
        "1" => "Response (RESPONSE)",
        "2" => "Plain Text Message (TXT_MSG)",
        "3" => "Acknowledgment (ACK)",
        "4" => "Node Advertisement (ADVERT)",
        "5" => "Group Text Message (GRP_TXT)",
        "6" => "Group Datagram (GRP_DATA)",
        "7" => "Anonymous Request (ANON_REQ)",
        "8" => "Returned Path (PATH)",
        "9" => "Trace (TRACE)",
        "10" => "Multi-part Packet",
        "11" => "Reserved Type 11",
        "12" => "Reserved Type 12",
        "13" => "Reserved Type 13",
        "14" => "Reserved Type 14",
        "15" => "Custom Packet (RAW_CUSTOM)",
        OTHER_PACKET_TYPE => "Other Types (>15)",
        _ => return None,
    })
}

/// Default spec for a catalogue series, on the default archive ladder.
///
/// Counters consolidate by SUM and reject negatives; gauges average and carry
/// the value range of their data source. Names outside the catalogue get an
/// unbounded AVERAGE series.
pub fn catalogue_spec(name: &str) -> SeriesSpec {
    let (cf, bounds) = match name {
        RX_COUNT | TX_COUNT | DROP_COUNT | PACKET_TYPE => {
            (Consolidation::Sum, Bounds::at_least(0.0))
        }
        AVG_RSSI | NOISE_FLOOR => (Consolidation::Average, Bounds::between(-200.0, 0.0)),
        AVG_SNR => (Consolidation::Average, Bounds::between(-30.0, 30.0)),
        AVG_LENGTH => (Consolidation::Average, Bounds::between(0.0, 256.0)),
        AVG_SCORE => (Consolidation::Average, Bounds::between(0.0, 1.0)),
        NEIGHBOR_COUNT => (Consolidation::Average, Bounds::at_least(0.0)),
        _ => (Consolidation::Average, Bounds::UNBOUNDED),
    };
    SeriesSpec::with_default_ladder(cf).bounds(bounds)
}

/// Identity of one series: a metric name plus an optional sub-key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesKey {
    /// Metric name.
    pub name: String,
    /// Category within the metric, e.g. a packet type.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub sub_key: Option<String>,
}

impl SeriesKey {
    /// Key without a sub-key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_key: None,
        }
    }

    /// Key with a sub-key.
    pub fn with_sub(name: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_key: Some(sub_key.into()),
        }
    }

    /// Key of the counter for one packet type.
    pub fn packet_type(packet_type: u32) -> Self {
        Self::with_sub(PACKET_TYPE, packet_type_key(packet_type))
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_key {
            Some(sub) => write!(f, "{}:{}", self.name, sub),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for SeriesKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One packet seen by the relay, as reported by the packet dispatcher.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketRecord {
    /// Epoch seconds; `None` means "now".
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub timestamp: Option<f64>,
    /// Packet type id.
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub packet_type: u32,
    /// Received signal strength, dBm.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub rssi: Option<f64>,
    /// Signal to noise ratio, dB.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub snr: Option<f64>,
    /// Length in bytes.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub length: Option<f64>,
    /// Routing score.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub score: Option<f64>,
    /// Whether the relay forwarded the packet. Not forwarded counts as dropped.
    #[cfg_attr(feature = "serde", serde(default))]
    pub transmitted: bool,
}

impl PacketRecord {
    /// A received packet of the given type.
    pub fn new(packet_type: u32) -> Self {
        Self {
            packet_type,
            ..Default::default()
        }
    }

    /// Set the timestamp.
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set signal readings.
    pub fn signal(mut self, rssi: f64, snr: f64) -> Self {
        self.rssi = Some(rssi);
        self.snr = Some(snr);
        self
    }

    /// Set the packet length.
    pub fn length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the routing score.
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Mark as forwarded.
    pub fn transmitted(mut self, transmitted: bool) -> Self {
        self.transmitted = transmitted;
        self
    }
}
