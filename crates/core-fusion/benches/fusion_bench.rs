use std::hint::black_box;

use core_fusion::{fuse, OrderingContext};
use core_storyboard::{Command, Easing, FadeCommand, MoveCommand, Vec2};
use criterion::{criterion_group, criterion_main, Criterion};

fn dense_overlap(n: usize) -> Vec<Box<dyn Command>> {
    (0..n)
        .map(|i| {
            let start = i as f64 * 500.0;
            Box::new(MoveCommand::new(
                Easing::None,
                start,
                start + 800.0,
                Vec2::new(i as f64, 0.0),
                Vec2::new(i as f64 + 1.0, 0.0),
            )) as Box<dyn Command>
        })
        .collect()
}

fn sparse_mixed(n: usize) -> Vec<Box<dyn Command>> {
    (0..n)
        .map(|i| {
            let start = i as f64 * 2_000.0;
            if i % 2 == 0 {
                Box::new(MoveCommand::new(
                    Easing::None,
                    start,
                    start + 500.0,
                    Vec2::default(),
                    Vec2::new(1.0, 1.0),
                )) as Box<dyn Command>
            } else {
                Box::new(FadeCommand::new(Easing::None, start, start + 500.0, 0.0, 1.0))
                    as Box<dyn Command>
            }
        })
        .collect()
}

fn bench_fuse(c: &mut Criterion) {
    let ctx = OrderingContext::default();
    let dense = dense_overlap(1_000);
    c.bench_function("fuse_dense_overlap_1k", |b| {
        b.iter(|| fuse(black_box(&dense), &ctx))
    });
    let sparse = sparse_mixed(1_000);
    c.bench_function("fuse_sparse_mixed_1k", |b| {
        b.iter(|| fuse(black_box(&sparse), &ctx))
    });
}

criterion_group!(benches, bench_fuse);
criterion_main!(benches);
