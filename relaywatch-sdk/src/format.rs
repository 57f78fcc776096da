//! Shaping query results into dashboard payloads.
//!
//! Pure functions, no store access. Chart arrays use integer epoch
//! milliseconds; history samples keep float epoch seconds.

use std::collections::BTreeMap;

use relaywatch_types::wire::{
    ApiResponse, ChartData, ChartPoint, GraphData, GraphSeries, NoiseFloorChart,
    NoiseFloorHistory, NoiseFloorSample, NoiseFloorStats, PacketStats, PacketTypeStats,
    RawSeriesData,
};
use relaywatch_types::{Consolidation, HistoryRecord, Point, SeriesKey, WindowStats};
use serde::Serialize;
use serde_json::{json, Value};

use crate::series::SeriesWindow;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Points as `[timestamp_ms, value]` pairs.
pub fn chart_points(points: &[Point]) -> Vec<ChartPoint> {
    points.iter().map(|p| (p.start_ms(), p.value)).collect()
}

/// History records as `[timestamp_ms, value]` pairs.
pub fn history_points(records: &[HistoryRecord]) -> Vec<ChartPoint> {
    records.iter().map(|r| (r.timestamp_ms(), r.value)).collect()
}

/// `packet_stats` payload. Averages are rounded and default to zero.
pub fn packet_stats(
    total: u64,
    transmitted: u64,
    dropped: u64,
    avg_rssi: Option<f64>,
    avg_snr: Option<f64>,
    hours: u32,
) -> PacketStats {
    PacketStats {
        total_packets: total,
        transmitted_packets: transmitted,
        dropped_packets: dropped,
        avg_rssi: avg_rssi.map(round1).unwrap_or(0.0),
        avg_snr: avg_snr.map(round1).unwrap_or(0.0),
        hours,
    }
}

/// `packet_type_stats` payload.
pub fn packet_type_stats(totals: BTreeMap<String, u64>, hours: u32) -> PacketTypeStats {
    PacketTypeStats {
        total_packets: totals.values().sum(),
        packet_type_totals: totals,
        hours,
        period: format!("{hours} hours"),
    }
}

/// One named graph line.
pub fn graph_series(kind: impl Into<String>, name: impl Into<String>, points: &[Point]) -> GraphSeries {
    GraphSeries {
        kind: kind.into(),
        name: name.into(),
        data: chart_points(points),
    }
}

/// Graph payload over `[from, to]`.
pub fn graph_data(from: f64, to: f64, step: u64, series: Vec<GraphSeries>) -> GraphData {
    GraphData {
        start_time: from.floor() as i64,
        end_time: to.floor() as i64,
        step,
        series,
    }
}

/// `rrd_data` payload: bucket starts in epoch seconds.
pub fn raw_series(
    key: &SeriesKey,
    cf: Consolidation,
    from: f64,
    to: f64,
    window: &SeriesWindow,
) -> RawSeriesData {
    RawSeriesData {
        series: key.name.clone(),
        sub_key: key.sub_key.clone(),
        consolidation: cf.as_str().to_string(),
        start_time: from.floor() as i64,
        end_time: to.floor() as i64,
        step: window.step,
        points: window
            .points_with(cf)
            .into_iter()
            .map(|p| (p.start, p.value))
            .collect(),
    }
}

/// `noise_floor_history` payload.
pub fn noise_floor_history(records: &[HistoryRecord], hours: u32) -> NoiseFloorHistory {
    let history: Vec<NoiseFloorSample> = records
        .iter()
        .map(|r| NoiseFloorSample {
            timestamp: r.timestamp,
            noise_floor_dbm: r.value,
        })
        .collect();
    NoiseFloorHistory {
        count: history.len(),
        history,
        hours,
    }
}

/// `noise_floor_stats` payload.
pub fn noise_floor_stats(stats: WindowStats, hours: u32) -> NoiseFloorStats {
    NoiseFloorStats { stats, hours }
}

/// `noise_floor_chart_data` payload.
pub fn noise_floor_chart(records: &[HistoryRecord], statistics: WindowStats, hours: u32) -> NoiseFloorChart {
    NoiseFloorChart {
        chart_data: ChartData {
            data_points: history_points(records),
            statistics,
        },
        hours,
    }
}

/// Wrap a payload in the `{success, data}` / `{success, error}` envelope.
pub fn envelope<T: Serialize>(result: Result<T, String>) -> Value {
    let response = match result {
        Ok(data) => ApiResponse::ok(data),
        Err(error) => ApiResponse::err(error),
    };
    serde_json::to_value(&response)
        .unwrap_or_else(|e| json!({ "success": false, "error": format!("Serialization failed: {e}") }))
}
