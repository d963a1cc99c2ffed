//! Benchmarks pour la résolution de territoire

use conquest::{PlayerId, RegionId, TerritoryEngine, TerritoryRegion};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geo::{LineString, Polygon};
use std::time::SystemTime;

fn metric_square(engine: &TerritoryEngine, x: f64, y: f64, side: f64) -> Polygon {
    let square = Polygon::new(
        LineString::from(vec![
            (500_000.0 + x, 5_000_000.0 + y),
            (500_000.0 + x + side, 5_000_000.0 + y),
            (500_000.0 + x + side, 5_000_000.0 + y + side),
            (500_000.0 + x, 5_000_000.0 + y + side),
            (500_000.0 + x, 5_000_000.0 + y),
        ]),
        vec![],
    );
    engine.projection().to_geographic(&square).unwrap()
}

/// Grille de `n × n` zones de 50 m appartenant alternativement à deux rivaux
fn rival_grid(engine: &TerritoryEngine, n: usize) -> Vec<TerritoryRegion> {
    let now = SystemTime::now();
    let mut regions = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let polygon = metric_square(engine, i as f64 * 50.0, j as f64 * 50.0, 50.0);
            regions.push(TerritoryRegion {
                id: RegionId((i * n + j) as i64),
                owner: PlayerId(2 + ((i + j) % 2) as i64),
                area_m2: 2_500.0,
                polygon,
                created_at: now,
                last_modified: now,
            });
        }
    }
    regions
}

fn bench_prepare(c: &mut Criterion) {
    let engine = TerritoryEngine::default();
    let square = metric_square(&engine, 0.0, 0.0, 400.0);

    c.bench_function("prepare_square", |b| {
        b.iter(|| engine.prepare(black_box(square.exterior().clone())).unwrap())
    });
}

fn bench_resolve(c: &mut Criterion) {
    let engine = TerritoryEngine::default();
    let route = engine
        .prepare(metric_square(&engine, 25.0, 25.0, 300.0).into_inner().0)
        .unwrap();

    let mut group = c.benchmark_group("resolve");
    group.sample_size(10);

    for n in [2usize, 4, 8] {
        let touching = rival_grid(&engine, n);
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &touching, |b, touching| {
            b.iter(|| black_box(engine.resolve(&route, PlayerId(1), touching)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_prepare, bench_resolve);
criterion_main!(benches);
