//! Response shapes of the dashboard query surface.
//!
//! Field names are the compatibility contract with the dashboard front-end.
//! Chart point arrays carry integer epoch milliseconds; history records carry
//! float epoch seconds.

use std::collections::BTreeMap;

use crate::WindowStats;

/// `[timestamp_ms, value]` chart point.
pub type ChartPoint = (i64, f64);

/// Envelope wrapped around every endpoint response.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub data: Option<T>,
    /// Error message on failure.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// `packet_stats` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketStats {
    /// Packets received in the window.
    pub total_packets: u64,
    /// Packets forwarded.
    pub transmitted_packets: u64,
    /// Packets not forwarded.
    pub dropped_packets: u64,
    /// Mean RSSI rounded to 0.1 dBm; 0 without data.
    pub avg_rssi: f64,
    /// Mean SNR rounded to 0.1 dB; 0 without data.
    pub avg_snr: f64,
    /// Window length.
    pub hours: u32,
}

/// `packet_type_stats` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketTypeStats {
    /// Count per packet-type id (`"0"`..`"15"`, `"other"`).
    pub packet_type_totals: BTreeMap<String, u64>,
    /// Sum of all type counts.
    pub total_packets: u64,
    /// Window length.
    pub hours: u32,
    /// Window description, e.g. `"24 hours"`.
    pub period: String,
}

/// One named line of a graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphSeries {
    /// Machine id of the series (`rx_count`, `type_4`, ...).
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    /// Display name.
    pub name: String,
    /// Points, oldest first.
    pub data: Vec<ChartPoint>,
}

/// `packet_type_graph_data` and `metrics_graph_data` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphData {
    /// Window start, epoch seconds.
    pub start_time: i64,
    /// Window end, epoch seconds.
    pub end_time: i64,
    /// Bucket width of the finest archive used, seconds.
    pub step: u64,
    /// One entry per requested series.
    pub series: Vec<GraphSeries>,
}

/// `rrd_data` payload: one series exactly as stored.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSeriesData {
    /// Series name.
    pub series: String,
    /// Sub-key, when the series has one.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub sub_key: Option<String>,
    /// Consolidation function the values were read with.
    pub consolidation: String,
    /// Window start, epoch seconds.
    pub start_time: i64,
    /// Window end, epoch seconds.
    pub end_time: i64,
    /// Bucket width of the finest archive used, seconds.
    pub step: u64,
    /// `(bucket_start_time, value)`, epoch seconds, oldest first.
    pub points: Vec<(i64, f64)>,
}

/// One noise-floor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseFloorSample {
    /// Epoch seconds.
    pub timestamp: f64,
    /// Reading in dBm.
    pub noise_floor_dbm: f64,
}

/// `noise_floor_history` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseFloorHistory {
    /// Readings, oldest first.
    pub history: Vec<NoiseFloorSample>,
    /// Window length.
    pub hours: u32,
    /// Number of readings.
    pub count: usize,
}

/// `noise_floor_stats` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseFloorStats {
    /// Window statistics.
    pub stats: WindowStats,
    /// Window length.
    pub hours: u32,
}

/// Points plus statistics for the noise-floor chart.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartData {
    /// Readings as chart points.
    pub data_points: Vec<ChartPoint>,
    /// Statistics over the same readings.
    pub statistics: WindowStats,
}

/// `noise_floor_chart_data` payload.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseFloorChart {
    /// Chart points and statistics.
    pub chart_data: ChartData,
    /// Window length.
    pub hours: u32,
}
