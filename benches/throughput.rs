//! Codec and acquisition throughput benchmarks
//!
//! Run with: cargo bench --bench throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use soil_probe::codec::{build_read_request, build_read_response, parse_read_response};
use soil_probe::{AcquisitionSession, SensorConfig, SimulatedSensor, Timing};

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    group.bench_function("build_read_request", |b| {
        b.iter(|| build_read_request(black_box(1), black_box(0x0015), black_box(1)))
    });

    let response = build_read_response(1, 312);
    group.bench_function("parse_read_response", |b| {
        b.iter(|| parse_read_response(black_box(&response), black_box(1)))
    });

    group.finish();
}

fn bench_acquisition(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let config = SensorConfig::default().with_timing(Timing::immediate());
    let mut session = AcquisitionSession::new(SimulatedSensor::demo(1), &config);

    // Demo map sends nitrogen through the fallback search every cycle
    c.bench_function("acquire_reading_simulated", |b| {
        b.iter(|| runtime.block_on(session.acquire_reading()))
    });
}

criterion_group!(benches, bench_codec, bench_acquisition);
criterion_main!(benches);
