use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relaywatch_sdk::{Consolidation, PacketRecord, RelayStats, RollupMode, Series, SeriesSpec};

/// Benchmark a single counter increment (hot path)
fn bench_increment(c: &mut Criterion) {
    let stats = RelayStats::builder().build().unwrap();
    let recorder = stats.recorder();

    c.bench_function("increment", |b| {
        b.iter(|| {
            recorder.increment(black_box("rx_count"), None);
        });
    });
}

/// Benchmark a gauge reading
fn bench_record_gauge(c: &mut Criterion) {
    let stats = RelayStats::builder().build().unwrap();
    let recorder = stats.recorder();

    c.bench_function("record_gauge", |b| {
        b.iter(|| {
            recorder.record_gauge(black_box("avg_rssi"), black_box(-92.5));
        });
    });
}

/// Benchmark the full packet fan-out
fn bench_record_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_packet");

    for mode in [RollupMode::OnWrite, RollupMode::Timer] {
        let stats = RelayStats::builder().rollup_mode(mode).build().unwrap();
        let recorder = stats.recorder();
        let packet = PacketRecord::new(4).signal(-92.0, 6.25).length(48.0).transmitted(true);

        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &packet, |b, packet| {
            b.iter(|| {
                recorder.record_packet(black_box(packet));
            });
        });
    }
    group.finish();
}

/// Benchmark series updates with one sample per bucket, so every call opens
/// a bucket and eventually overwrites a full ring
fn bench_series_update_new_buckets(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_update_new_buckets");

    for buckets in [60usize, 1440].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(buckets), buckets, |b, &buckets| {
            let mut series = Series::new(
                SeriesSpec::new(Consolidation::Average)
                    .archive(60, buckets)
                    .archive(3600, 168),
            );
            let mut ts = 0.0;
            b.iter(|| {
                ts += 60.0;
                series.update(black_box(-100.0), ts);
                series.rollup_one(ts);
            });
        });
    }
    group.finish();
}

/// Benchmark recording across many packet-type sub-keys
fn bench_multiple_sub_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiple_sub_keys");
    let stats = RelayStats::builder().build().unwrap();
    let recorder = stats.recorder();

    for key_count in [1u32, 4, 17].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(key_count),
            key_count,
            |b, &key_count| {
                b.iter(|| {
                    for i in 0..key_count {
                        let key = relaywatch_types::packet_type_key(i);
                        recorder.increment(black_box("packet_type"), Some(&key));
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_increment,
    bench_record_gauge,
    bench_record_packet,
    bench_series_update_new_buckets,
    bench_multiple_sub_keys
);
criterion_main!(benches);
