// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect, Size, Vec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_bucket::{Area, IndexConfig};
use strata_layer::{Displayable, DisplayableId, DisplayableKind, Layer, LayerFilter, LayerId};

const LID: LayerId = LayerId(0);
const SIDE: f64 = 40_000.0;

fn random_rect(rng: &mut StdRng, max: f64) -> Rect {
    let w = rng.random_range(1.0..max);
    let h = rng.random_range(1.0..max);
    let x = rng.random_range(0.0..SIDE - w);
    let y = rng.random_range(0.0..SIDE - h);
    Rect::new(x, y, x + w, y + h)
}

fn gen_layer(count: usize, buckets: bool) -> Layer {
    let mut rng = StdRng::seed_from_u64(0xB0C4_E75E);
    let mut layer = Layer::with_config(LID, Size::new(SIDE, SIDE), IndexConfig::default());
    layer.set_buckets_enabled(buckets);
    for i in 0..count {
        let kind = if i % 10 == 0 {
            DisplayableKind::Label
        } else {
            DisplayableKind::Profile
        };
        let d = Displayable::new(DisplayableId(i as u64), kind)
            .with_footprint(LID, Area::from_rect(random_rect(&mut rng, 800.0)));
        layer.add(Arc::new(d));
    }
    layer.check_buckets();
    layer
}

fn gen_points(count: usize) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(0x9017_5EED);
    (0..count)
        .map(|_| Point::new(rng.random_range(0.0..SIDE), rng.random_range(0.0..SIDE)))
        .collect()
}

fn bench_point_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_at");
    let points = gen_points(256);
    for &n in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(points.len() as u64));
        for (name, buckets) in [("buckets", true), ("scan", false)] {
            let layer = gen_layer(n, buckets);
            group.bench_function(format!("{name}_n{n}"), |b| {
                b.iter(|| {
                    let hits: usize = points
                        .iter()
                        .map(|&p| layer.find_at(black_box(p), LayerFilter::visible()).len())
                        .sum();
                    black_box(hits);
                });
            });
        }
    }
    group.finish();
}

fn bench_rect_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_in_rect");
    let mut rng = StdRng::seed_from_u64(0x4EC7);
    let viewports: Vec<Rect> = (0..64).map(|_| random_rect(&mut rng, 4000.0)).collect();
    for &n in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(viewports.len() as u64));
        for (name, buckets) in [("buckets", true), ("scan", false)] {
            let layer = gen_layer(n, buckets);
            group.bench_function(format!("exact_{name}_n{n}"), |b| {
                b.iter(|| {
                    let hits: usize = viewports
                        .iter()
                        .map(|&r| layer.find_in_rect(black_box(r), LayerFilter::all()).len())
                        .sum();
                    black_box(hits);
                });
            });
        }
        let layer = gen_layer(n, true);
        group.bench_function(format!("rough_buckets_n{n}"), |b| {
            b.iter(|| {
                let hits: usize = viewports
                    .iter()
                    .map(|&r| layer.roughly_find(black_box(r), LayerFilter::all()).len())
                    .sum();
                black_box(hits);
            });
        });
    }
    group.finish();
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");
    for &n in &[1_000usize, 10_000] {
        group.bench_function(format!("populate_n{n}"), |b| {
            b.iter_batched(
                || gen_layer(n, false),
                |mut layer| {
                    layer.set_buckets_enabled(true);
                    layer.recreate_buckets();
                    black_box(layer.index().map(|i| i.leaf_count()));
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("translate_n{n}"), |b| {
            b.iter_batched(
                || gen_layer(n, true),
                |mut layer| {
                    for i in (0..n).step_by(97) {
                        layer.translate(DisplayableId(i as u64), Vec2::new(250.0, -120.0));
                    }
                    black_box(layer.len());
                },
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("move_top_n{n}"), |b| {
            b.iter_batched(
                || gen_layer(n, true),
                |mut layer| {
                    for i in (1..n).step_by(211) {
                        layer.move_top(DisplayableId(i as u64));
                    }
                    black_box(layer.len());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_point_queries, bench_rect_queries, bench_maintenance);
criterion_main!(benches);
