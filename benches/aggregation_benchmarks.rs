use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pod_usage_report::metrics::{aggregate, EngineConfig};
use pod_usage_report::parsing::parse_memory_to_bytes;
use pod_usage_report::{MetricKind, MetricSeriesSets, PodIdentity, TimeSeries, TimeSeriesPoint};

fn build_sets(pods: usize, points: usize) -> MetricSeriesSets {
    let end = Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap();
    let mut sets = MetricSeriesSets::default();
    for i in 0..pods {
        let pod = PodIdentity::new("prod", format!("ns-{}", i % 10), format!("pod-{}", i));
        for kind in MetricKind::ALL {
            let samples = (0..points)
                .map(|p| {
                    let ts = end - Duration::seconds(15 * (points - p) as i64);
                    TimeSeriesPoint::new(ts, ((i + p) % 97) as f64 * 1.5e6)
                })
                .collect();
            sets.insert(TimeSeries::new(pod.clone(), kind, samples));
        }
    }
    sets
}

fn aggregate_benchmark(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap();
    let config = EngineConfig::default();
    let sets = build_sets(500, 240);

    c.bench_function("aggregate 500 pods x 240 points", |b| {
        b.iter(|| black_box(aggregate(black_box(&sets), &config, now)))
    });
}

fn memory_parsing_benchmark(c: &mut Criterion) {
    let test_values = vec!["1Ki", "1Mi", "1Gi", "1Ti", "1K", "1M", "1G", "512Mi", "2.5Gi"];

    c.bench_function("parse_memory_to_bytes", |b| {
        b.iter(|| {
            for value in &test_values {
                black_box(parse_memory_to_bytes(black_box(value)));
            }
        })
    });
}

criterion_group!(benches, aggregate_benchmark, memory_parsing_benchmark);
criterion_main!(benches);
