//! Performance benchmarks for the commutematch pipeline.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks use seeded synthetic trip data so results are
//! reproducible across runs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use commutematch::{
    cluster_trips, CommutePipeline, PipelineConfig, SpatialConfig, TransitStation, TripPoint,
    TripRecord,
};

// ============================================================================
// Synthetic Trip Generation
// ============================================================================

/// Generate one commuting day's trips for a user: a morning ride out and
/// an evening ride back, with GPS-like jitter on the endpoints and a few
/// minutes of jitter on the departure times.
fn generate_commute_days(
    rng: &mut StdRng,
    home: TripPoint,
    work: TripPoint,
    days: usize,
) -> Vec<TripRecord> {
    let mut trips = Vec::with_capacity(days * 2);

    for day in 0..days {
        let jitter = |rng: &mut StdRng| rng.gen_range(-25.0..25.0);
        let origin = TripPoint::new(home.x + jitter(rng), home.y + jitter(rng));
        let destination = TripPoint::new(work.x + jitter(rng), work.y + jitter(rng));

        let morning_minute = rng.gen_range(0..20);
        let evening_minute = rng.gen_range(0..20);

        trips.push(
            TripRecord::new(
                &format!("trip-{day}-out"),
                origin,
                destination,
                &format!("08:{morning_minute:02}:00"),
                &format!("08:{:02}:00", morning_minute + 20),
                "2023-05-08",
            )
            .expect("synthetic trip is valid"),
        );
        trips.push(
            TripRecord::new(
                &format!("trip-{day}-back"),
                destination,
                origin,
                &format!("18:{evening_minute:02}:00"),
                &format!("18:{:02}:00", evening_minute + 20),
                "2023-05-08",
            )
            .expect("synthetic trip is valid"),
        );
    }

    trips
}

/// Generate a small station grid around the commute corridor.
fn generate_stations(rng: &mut StdRng, count: usize) -> Vec<TransitStation> {
    (0..count)
        .map(|i| {
            TransitStation::new(
                &format!("station-{i}"),
                TripPoint::new(rng.gen_range(-2000.0..8000.0), rng.gen_range(-2000.0..8000.0)),
            )
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_spatial_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_clustering");

    for days in [5, 25, 100] {
        let mut rng = StdRng::seed_from_u64(42);
        let trips = generate_commute_days(
            &mut rng,
            TripPoint::new(0.0, 0.0),
            TripPoint::new(3000.0, 1000.0),
            days,
        );

        group.bench_with_input(BenchmarkId::from_parameter(days * 2), &trips, |b, trips| {
            b.iter(|| cluster_trips(black_box(trips), &SpatialConfig::default()).unwrap());
        });
    }

    group.finish();
}

fn bench_classify_trips(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_trips");

    for days in [5, 25, 100] {
        let mut rng = StdRng::seed_from_u64(7);
        let trips = generate_commute_days(
            &mut rng,
            TripPoint::new(0.0, 0.0),
            TripPoint::new(3000.0, 1000.0),
            days,
        );
        let stations = generate_stations(&mut rng, 50);
        let pipeline = CommutePipeline::new(PipelineConfig::default(), stations).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(days * 2), &trips, |b, trips| {
            b.iter(|| pipeline.classify_trips(black_box(trips)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spatial_clustering, bench_classify_trips);
criterion_main!(benches);
