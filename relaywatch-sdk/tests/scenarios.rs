//! End-to-end dashboard scenarios against a `RelayStats` on a manual clock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use relaywatch_sdk::{ArchiveSpec, ManualClock, PacketRecord, Point, RelayStats, SeriesKey};
use relaywatch_types::{NOISE_FLOOR, PACKET_TYPE_KEYS, RX_COUNT, TX_COUNT};

const NOW: f64 = 1_700_000_000.0;

fn relay_stats(now: f64) -> (RelayStats, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
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
fn noise_floor_minutes_and_statistics() {
    let clock = Arc::new(ManualClock::new(120.0));
    let stats = RelayStats::builder()
        .clock(clock)
        .ladder([ArchiveSpec::new(60, 60), ArchiveSpec::new(600, 24)])
        .build()
        .unwrap();
    let recorder = stats.recorder();

    recorder.record_noise_floor(-95.0, Some(0.0));
    recorder.record_noise_floor(-90.0, Some(60.0));
    recorder.record_noise_floor(-100.0, Some(120.0));
    stats.run_maintenance();

    let key = SeriesKey::new(NOISE_FLOOR);
    let window = stats.query().series_window(&key, 0.0, 120.0, None);
    assert_eq!(window.step, 60);
    assert_eq!(
        window.points(),
        vec![
            Point::new(0, -95.0),
            Point::new(60, -90.0),
            Point::new(120, -100.0)
        ]
    );

    for s in [window.stats(), stats.query().window_stats(&key, 0.0, 120.0)] {
        assert_eq!(s.count, 3);
        assert_eq!(s.average, Some(-95.0));
        assert_eq!(s.min, Some(-100.0));
        assert_eq!(s.max, Some(-90.0));
    }
}

#[test]
fn packet_type_counts_within_the_hour() {
    let (stats, _) = relay_stats(NOW);
    let recorder = stats.recorder();

    for i in 0..5u32 {
        recorder.record_packet(&PacketRecord::new(0).at(NOW - 3000.0 + f64::from(i)));
    }
    for i in 0..2u32 {
        recorder.record_packet(&PacketRecord::new(1).at(NOW - 60.0 * f64::from(i)));
    }
    // outside the window
    recorder.record_packet(&PacketRecord::new(0).at(NOW - 2.0 * 3600.0));
    stats.run_maintenance();

    let typed = stats.dashboard().packet_type_stats(1);
    assert_eq!(typed.packet_type_totals.len(), PACKET_TYPE_KEYS.len());
    assert_eq!(typed.packet_type_totals["0"], 5);
    assert_eq!(typed.packet_type_totals["1"], 2);
    for key in PACKET_TYPE_KEYS {
        if key != "0" && key != "1" {
            assert_eq!(typed.packet_type_totals[key], 0, "{key}");
        }
    }
    assert_eq!(typed.total_packets, 7);

    let value = stats
        .dashboard()
        .handle("packet_type_stats", &params(&[("hours", "1")]));
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["packet_type_totals"]["0"], 5);
    assert_eq!(value["data"]["packet_type_totals"]["other"], 0);
}

#[test]
fn window_older_than_retention_is_empty_but_successful() {
    let (stats, _) = relay_stats(NOW);
    stats.recorder().record_packet(&PacketRecord::new(2).at(NOW - 30.0));
    stats.run_maintenance();

    let month_ago = (NOW - 30.0 * 86_400.0).to_string();
    let three_weeks_ago = (NOW - 21.0 * 86_400.0).to_string();
    let value = stats.dashboard().handle(
        "rrd_data",
        &params(&[
            ("series", RX_COUNT),
            ("start_time", month_ago.as_str()),
            ("end_time", three_weeks_ago.as_str()),
        ]),
    );
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["points"].as_array().unwrap().len(), 0);

    let window = stats.query().series_window(
        &SeriesKey::new(RX_COUNT),
        NOW - 30.0 * 86_400.0,
        NOW - 21.0 * 86_400.0,
        None,
    );
    assert!(window.is_empty());
}

#[test]
fn concurrent_writers_lose_nothing() {
    const PER_WRITER: u32 = 2_000;
    let (stats, _) = relay_stats(NOW);

    let writers: Vec<_> = [RX_COUNT, TX_COUNT]
        .into_iter()
        .map(|name| {
            let recorder = stats.recorder();
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    let ts = NOW - 600.0 + f64::from(i % 600);
                    recorder.record(name, 1.0, None, Some(ts));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    stats.run_maintenance();

    assert_eq!(stats.drops().total(), 0);
    let query = stats.query();
    for name in [RX_COUNT, TX_COUNT] {
        let window = query.series_window(&SeriesKey::new(name), NOW - 3600.0, NOW, None);
        assert_eq!(window.total(), f64::from(PER_WRITER), "{name}");
        // every bucket stays internally consistent
        for bucket in &window.buckets {
            assert_eq!(bucket.sum, bucket.count as f64);
            assert_eq!(bucket.min, 1.0);
            assert_eq!(bucket.max, 1.0);
        }
    }
}

#[test]
fn writers_to_the_same_series_contend_safely() {
    let (stats, _) = relay_stats(NOW);

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let recorder = stats.recorder();
            thread::spawn(move || {
                for _ in 0..500 {
                    recorder.record(RX_COUNT, 1.0, None, Some(NOW - 10.0));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    stats.run_maintenance();

    let total = stats
        .query()
        .total(&SeriesKey::new(RX_COUNT), NOW - 60.0, NOW);
    assert_eq!(total, 2_000.0);
}

#[test]
fn a_busy_series_does_not_hold_up_others() {
    let (stats, _) = relay_stats(NOW);
    let rx = stats.store().get_or_create(&SeriesKey::new(RX_COUNT));

    let rx_guard = rx.lock();
    let writer = {
        let recorder = stats.recorder();
        thread::spawn(move || {
            recorder.record(RX_COUNT, 1.0, None, Some(NOW - 10.0));
            recorder.record(TX_COUNT, 1.0, None, Some(NOW - 10.0));
        })
    };
    writer.join().unwrap();

    let query = stats.query();
    assert_eq!(query.total(&SeriesKey::new(TX_COUNT), NOW - 60.0, NOW), 1.0);

    drop(rx_guard);
    assert_eq!(stats.run_maintenance().drained, 1);
    assert_eq!(query.total(&SeriesKey::new(RX_COUNT), NOW - 60.0, NOW), 1.0);
    assert_eq!(stats.drops().total(), 0);
}

#[test]
fn dashboard_snapshot_covers_every_endpoint() {
    let (stats, _) = relay_stats(NOW);
    let recorder = stats.recorder();
    recorder.record_packet(
        &PacketRecord::new(4)
            .at(NOW - 120.0)
            .signal(-91.0, 5.5)
            .transmitted(true),
    );
    recorder.record_noise_floor(-111.0, Some(NOW - 100.0));
    stats.run_maintenance();

    let snapshot = stats.dashboard().snapshot(24);
    for endpoint in relaywatch_sdk::ENDPOINTS {
        assert!(snapshot.get(endpoint).is_some(), "{endpoint}");
    }
    assert_eq!(snapshot["packet_stats"]["transmitted_packets"], 1);
    assert_eq!(snapshot["noise_floor_history"]["count"], 1);
}
