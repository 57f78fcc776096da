//! The dashboard query surface: one method per endpoint plus a
//! string-keyed dispatcher that always answers with the JSON envelope.

use std::collections::BTreeMap;
use std::sync::Arc;

use relaywatch_types::wire::{
    GraphData, GraphSeries, NoiseFloorChart, NoiseFloorHistory, NoiseFloorStats, PacketStats,
    PacketTypeStats, RawSeriesData,
};
use relaywatch_types::{
    metric_display_name, packet_type_name, Consolidation, SeriesKey, AVG_RSSI, AVG_SNR,
    DROP_COUNT, GRAPH_METRICS, PACKET_TYPE, PACKET_TYPE_KEYS, RX_COUNT, TX_COUNT,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::clock::Clock;
use crate::format;
use crate::query::QueryEngine;

/// Window used when a request carries no `hours`.
pub const DEFAULT_HOURS: u32 = 24;

/// Every endpoint served by [`Dashboard::handle`].
pub const ENDPOINTS: [&str; 8] = [
    "packet_stats",
    "packet_type_stats",
    "packet_type_graph_data",
    "metrics_graph_data",
    "rrd_data",
    "noise_floor_history",
    "noise_floor_stats",
    "noise_floor_chart_data",
];

/// Parameters of [`Dashboard::rrd_data`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuery {
    /// Series name; `rx_count` when unset.
    pub series: Option<String>,
    /// Sub-key of the series.
    pub sub_key: Option<String>,
    /// Window start, epoch seconds; 24 hours before `end_time` when unset.
    pub start_time: Option<f64>,
    /// Window end, epoch seconds; now when unset.
    pub end_time: Option<f64>,
    /// Largest acceptable bucket width, seconds.
    pub resolution: Option<u64>,
    /// Consolidation to read with instead of the series' own.
    pub cf: Option<Consolidation>,
}

/// Endpoint implementations over a [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct Dashboard {
    query: QueryEngine,
    clock: Arc<dyn Clock>,
}

impl Dashboard {
    pub(crate) fn new(query: QueryEngine, clock: Arc<dyn Clock>) -> Self {
        Self { query, clock }
    }

    /// `(now - hours, now)` in epoch seconds.
    fn time_range(&self, hours: u32) -> (f64, f64) {
        let now = self.clock.now();
        (now - f64::from(hours) * 3600.0, now)
    }

    fn count(&self, name: &str, from: f64, to: f64) -> u64 {
        self.query.total(&SeriesKey::new(name), from, to).max(0.0).round() as u64
    }

    /// Packet counts and mean signal over the last `hours`.
    pub fn packet_stats(&self, hours: u32) -> PacketStats {
        let (from, to) = self.time_range(hours);
        format::packet_stats(
            self.count(RX_COUNT, from, to),
            self.count(TX_COUNT, from, to),
            self.count(DROP_COUNT, from, to),
            self.query.average(&SeriesKey::new(AVG_RSSI), from, to),
            self.query.average(&SeriesKey::new(AVG_SNR), from, to),
            hours,
        )
    }

    /// Count per packet type over the last `hours`; every type is listed.
    pub fn packet_type_stats(&self, hours: u32) -> PacketTypeStats {
        let (from, to) = self.time_range(hours);
        let totals = self.query.category_totals(PACKET_TYPE, PACKET_TYPE_KEYS, from, to);
        format::packet_type_stats(totals, hours)
    }

    fn graph<'a>(
        &self,
        hours: u32,
        base: &str,
        series: impl Iterator<Item = (SeriesKey, String, &'a str)>,
        cf: Option<Consolidation>,
    ) -> GraphData {
        let (from, to) = self.time_range(hours);
        let mut step = None;
        let lines: Vec<GraphSeries> = series
            .map(|(key, kind, name)| {
                let window = self.query.series_window(&key, from, to, None);
                step = step.max(Some(window.step));
                let points = window.points_with(cf.unwrap_or(window.consolidation));
                format::graph_series(kind, name, &points)
            })
            .collect();
        let step = step.unwrap_or_else(|| self.query.base_step(base));
        format::graph_data(from, to, step, lines)
    }

    /// One line per packet type. `types` of `None` means all; unknown ids
    /// are skipped.
    pub fn packet_type_graph_data(
        &self,
        hours: u32,
        types: Option<&[String]>,
        cf: Option<Consolidation>,
    ) -> GraphData {
        let selected: Vec<&str> = match types {
            None => PACKET_TYPE_KEYS.to_vec(),
            Some(types) => types
                .iter()
                .filter_map(|t| PACKET_TYPE_KEYS.iter().copied().find(|k| *k == t.as_str()))
                .collect(),
        };
        let series = selected.into_iter().filter_map(|key| {
            let name = packet_type_name(key)?;
            Some((SeriesKey::with_sub(PACKET_TYPE, key), format!("type_{key}"), name))
        });
        self.graph(hours, PACKET_TYPE, series, cf)
    }

    /// One line per relay metric. `metrics` of `None` means all; unknown
    /// names are skipped.
    pub fn metrics_graph_data(
        &self,
        hours: u32,
        metrics: Option<&[String]>,
        cf: Option<Consolidation>,
    ) -> GraphData {
        let selected: Vec<&str> = match metrics {
            None => GRAPH_METRICS.to_vec(),
            Some(metrics) => metrics
                .iter()
                .filter_map(|m| GRAPH_METRICS.iter().copied().find(|k| *k == m.as_str()))
                .collect(),
        };
        let series = selected.into_iter().filter_map(|metric| {
            let name = metric_display_name(metric)?;
            Some((SeriesKey::new(metric), metric.to_string(), name))
        });
        self.graph(hours, RX_COUNT, series, cf)
    }

    /// One series exactly as stored.
    pub fn rrd_data(&self, query: &RawQuery) -> RawSeriesData {
        let end = query.end_time.unwrap_or_else(|| self.clock.now());
        let start = query
            .start_time
            .unwrap_or(end - f64::from(DEFAULT_HOURS) * 3600.0);
        let key = SeriesKey {
            name: query.series.clone().unwrap_or_else(|| RX_COUNT.to_string()),
            sub_key: query.sub_key.clone(),
        };
        let window = self.query.series_window(&key, start, end, query.resolution);
        let cf = query.cf.unwrap_or(window.consolidation);
        format::raw_series(&key, cf, start, end, &window)
    }

    /// Raw noise-floor readings over the last `hours`.
    pub fn noise_floor_history(&self, hours: u32) -> NoiseFloorHistory {
        let (from, to) = self.time_range(hours);
        format::noise_floor_history(&self.query.history_range(from, to), hours)
    }

    /// Noise-floor statistics over the last `hours`.
    pub fn noise_floor_stats(&self, hours: u32) -> NoiseFloorStats {
        let (from, to) = self.time_range(hours);
        format::noise_floor_stats(self.query.history_stats(from, to), hours)
    }

    /// Noise-floor chart points plus statistics over the last `hours`.
    pub fn noise_floor_chart_data(&self, hours: u32) -> NoiseFloorChart {
        let (from, to) = self.time_range(hours);
        let records = self.query.history_range(from, to);
        let statistics = self.query.history_stats(from, to);
        format::noise_floor_chart(&records, statistics, hours)
    }

    /// Answer `endpoint` with string parameters, wrapped in the envelope.
    ///
    /// Unknown endpoints and unparsable parameters give `success: false`.
    pub fn handle(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Value {
        let result = self.dispatch(endpoint, params);
        if let Err(e) = &result {
            tracing::debug!(endpoint, error = %e, "dashboard request failed");
        }
        format::envelope(result)
    }

    fn dispatch(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Result<Value, String> {
        match endpoint {
            "packet_stats" => to_json(self.packet_stats(hours(params)?)),
            "packet_type_stats" => to_json(self.packet_type_stats(hours(params)?)),
            "packet_type_graph_data" => {
                let types = list(params, "types");
                to_json(self.packet_type_graph_data(hours(params)?, types.as_deref(), graph_cf(params)?))
            }
            "metrics_graph_data" => {
                let metrics = list(params, "metrics");
                to_json(self.metrics_graph_data(hours(params)?, metrics.as_deref(), graph_cf(params)?))
            }
            "rrd_data" => to_json(self.rrd_data(&raw_query(params)?)),
            "noise_floor_history" => to_json(self.noise_floor_history(hours(params)?)),
            "noise_floor_stats" => to_json(self.noise_floor_stats(hours(params)?)),
            "noise_floor_chart_data" => to_json(self.noise_floor_chart_data(hours(params)?)),
            other => Err(format!("Unknown endpoint: {other}")),
        }
    }

    /// Every endpoint's payload for the last `hours`, keyed by endpoint.
    pub fn snapshot(&self, hours: u32) -> Value {
        let (from, to) = self.time_range(hours);
        let raw = RawQuery {
            start_time: Some(from),
            end_time: Some(to),
            ..RawQuery::default()
        };
        json!({
            "packet_stats": self.packet_stats(hours),
            "packet_type_stats": self.packet_type_stats(hours),
            "packet_type_graph_data": self.packet_type_graph_data(hours, None, None),
            "metrics_graph_data": self.metrics_graph_data(hours, None, None),
            "rrd_data": self.rrd_data(&raw),
            "noise_floor_history": self.noise_floor_history(hours),
            "noise_floor_stats": self.noise_floor_stats(hours),
            "noise_floor_chart_data": self.noise_floor_chart_data(hours),
        })
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn invalid(e: impl std::fmt::Display) -> String {
    format!("Invalid parameter format: {e}")
}

fn hours(params: &BTreeMap<String, String>) -> Result<u32, String> {
    match params.get("hours") {
        Some(v) => v.trim().parse().map_err(invalid),
        None => Ok(DEFAULT_HOURS),
    }
}

fn float(params: &BTreeMap<String, String>, name: &str) -> Result<Option<f64>, String> {
    params
        .get(name)
        .map(|v| v.trim().parse::<f64>().map_err(invalid))
        .transpose()
}

/// CSV list; absent or `all` means no filter.
fn list(params: &BTreeMap<String, String>, name: &str) -> Option<Vec<String>> {
    let raw = params.get(name)?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return None;
    }
    Some(
        raw.split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// `cf` must name a consolidation function; the legacy `resolution` is
/// only honoured when it does.
fn graph_cf(params: &BTreeMap<String, String>) -> Result<Option<Consolidation>, String> {
    if let Some(cf) = params.get("cf") {
        return cf.parse().map(Some).map_err(invalid);
    }
    Ok(params.get("resolution").and_then(|r| r.parse().ok()))
}

fn raw_query(params: &BTreeMap<String, String>) -> Result<RawQuery, String> {
    let mut query = RawQuery {
        series: params.get("series").map(|s| s.trim().to_string()),
        sub_key: params.get("sub_key").map(|s| s.trim().to_string()),
        start_time: float(params, "start_time")?,
        end_time: float(params, "end_time")?,
        resolution: None,
        cf: None,
    };
    if let Some(cf) = params.get("cf") {
        query.cf = Some(cf.parse().map_err(invalid)?);
    }
    if let Some(res) = params.get("resolution") {
        let res = res.trim();
        match res.parse::<u64>() {
            Ok(secs) => query.resolution = Some(secs),
            Err(_) => query.cf = Some(res.parse().map_err(invalid)?),
        }
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::RelayStats;
    use relaywatch_types::PacketRecord;

    const NOW: f64 = 1_700_000_000.0;

    fn stats() -> (RelayStats, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let stats = RelayStats::builder().clock(clock.clone()).build().unwrap();
        (stats, clock)
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn packet_stats_counts_and_averages() {
        let (stats, _) = stats();
        let recorder = stats.recorder();
        recorder.record_packet(&PacketRecord::new(4).at(NOW - 60.0).signal(-90.0, 5.0).transmitted(true));
        recorder.record_packet(&PacketRecord::new(2).at(NOW - 30.0).signal(-95.0, 8.25));

        let packet = stats.dashboard().packet_stats(1);
        assert_eq!(packet.total_packets, 2);
        assert_eq!(packet.transmitted_packets, 1);
        assert_eq!(packet.dropped_packets, 1);
        assert_eq!(packet.avg_rssi, -92.5);
        assert_eq!(packet.avg_snr, 6.6);
    }

    #[test]
    fn packet_type_graph_filters_and_names() {
        let (stats, _) = stats();
        let recorder = stats.recorder();
        recorder.record_packet(&PacketRecord::new(4).at(NOW - 120.0));
        recorder.record_packet(&PacketRecord::new(42).at(NOW - 120.0));

        let dashboard = stats.dashboard();
        let types = vec!["4".to_string(), "other".to_string(), "99".to_string()];
        let graph = dashboard.packet_type_graph_data(1, Some(&types), None);

        let kinds: Vec<_> = graph.series.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, ["type_4", "type_other"]);
        assert_eq!(graph.series[0].name, "Node Advertisement (ADVERT)");
        let bucket_ms = relaywatch_types::align(NOW - 120.0, 60) * 1000;
        assert_eq!(graph.series[0].data, vec![(bucket_ms, 1.0)]);
        assert_eq!(graph.step, 60);

        let all = dashboard.packet_type_graph_data(1, None, None);
        assert_eq!(all.series.len(), PACKET_TYPE_KEYS.len());
    }

    #[test]
    fn metrics_graph_uses_display_names() {
        let (stats, _) = stats();
        stats.recorder().record("neighbor_count", 3.0, None, Some(NOW - 10.0));

        let metrics = vec!["neighbor_count".to_string(), "bogus".to_string()];
        let graph = stats.dashboard().metrics_graph_data(1, Some(&metrics), None);
        assert_eq!(graph.series.len(), 1);
        assert_eq!(graph.series[0].kind, "neighbor_count");
        assert_eq!(graph.series[0].name, "Neighbor Count");
        assert_eq!(graph.end_time - graph.start_time, 3600);
    }

    #[test]
    fn handle_wraps_results_in_envelope() {
        let (stats, _) = stats();
        let dashboard = stats.dashboard();

        let ok = dashboard.handle("noise_floor_stats", &params(&[("hours", "2")]));
        assert_eq!(ok, json!({ "success": true, "data": { "stats": { "count": 0 }, "hours": 2 } }));

        let bad = dashboard.handle("packet_stats", &params(&[("hours", "abc")]));
        assert_eq!(bad["success"], json!(false));
        assert!(bad["error"].as_str().unwrap().starts_with("Invalid parameter format"));

        let unknown = dashboard.handle("reboot", &BTreeMap::new());
        assert_eq!(unknown, json!({ "success": false, "error": "Unknown endpoint: reboot" }));
    }

    #[test]
    fn every_endpoint_answers() {
        let (stats, _) = stats();
        let dashboard = stats.dashboard();
        for endpoint in ENDPOINTS {
            let response = dashboard.handle(endpoint, &BTreeMap::new());
            assert_eq!(response["success"], json!(true), "{endpoint}: {response}");
        }
        let snapshot = dashboard.snapshot(24);
        for endpoint in ENDPOINTS {
            assert!(snapshot.get(endpoint).is_some(), "{endpoint}");
        }
    }

    #[test]
    fn graph_resolution_names_override_consolidation() {
        let (stats, _) = stats();
        let recorder = stats.recorder();
        recorder.record("avg_rssi", -80.0, None, Some(NOW - 50.0));
        recorder.record("avg_rssi", -100.0, None, Some(NOW - 40.0));
        let dashboard = stats.dashboard();

        let max = dashboard.handle(
            "metrics_graph_data",
            &params(&[("metrics", "avg_rssi"), ("resolution", "max"), ("hours", "1")]),
        );
        let point = &max["data"]["series"][0]["data"][0];
        assert_eq!(point[1], json!(-80.0));

        let bad = dashboard.handle("metrics_graph_data", &params(&[("cf", "median")]));
        assert_eq!(bad["success"], json!(false));
    }

    #[test]
    fn rrd_data_reads_a_series_as_stored() {
        let (stats, _) = stats();
        let recorder = stats.recorder();
        for _ in 0..3 {
            recorder.increment("rx_count", None);
        }
        let start = (NOW - 600.0).to_string();
        let response = stats.dashboard().handle(
            "rrd_data",
            &params(&[("series", "rx_count"), ("start_time", start.as_str()), ("resolution", "60")]),
        );
        let data = &response["data"];
        assert_eq!(data["consolidation"], json!("SUM"));
        assert_eq!(data["step"], json!(60));
        assert_eq!(data["points"][0][1], json!(3.0));

        let bad = stats.dashboard().handle("rrd_data", &params(&[("start_time", "yesterday")]));
        assert_eq!(bad["success"], json!(false));
    }

    #[test]
    fn old_window_is_empty_but_successful() {
        let (stats, clock) = stats();
        stats.recorder().record_noise_floor(-100.0, None);
        clock.advance(30.0 * 86_400.0);

        let response = stats.dashboard().handle("noise_floor_history", &params(&[("hours", "1")]));
        assert_eq!(
            response,
            json!({ "success": true, "data": { "history": [], "hours": 1, "count": 0 } })
        );
    }
}
