//! Entity save/load throughput.
//!
//! Measures record encoding and the two-phase load for a bare entity and a
//! fully populated one, plus a batch of entities written to one stream.
//!
//! Run with: `cargo bench --bench persist_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec3, Vec4};

use keystone_ecs::prelude::*;

fn bare_entity(index: u32) -> Entity {
    Entity::new(
        EntityId::new(index, 0),
        format!("bench-{index}"),
        Services::headless(),
        DirtySignal::new(),
    )
}

fn populated_entity(index: u32) -> Entity {
    let mut e = bare_entity(index);
    for kind in ComponentKind::ALL {
        e.attach_kind(kind);
    }
    let lines = e.attach::<LineRenderer>();
    for i in 0..32 {
        let x = i as f32;
        lines.add_segment(Vec3::new(x, 0.0, 0.0), Vec3::new(x, 1.0, 0.0), Vec4::ONE);
    }
    e
}

fn bench_single_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_record");
    for (label, entity) in [("bare", bare_entity(0)), ("populated", populated_entity(0))] {
        let bytes = entity.save_to_vec().unwrap();

        group.bench_function(BenchmarkId::new("save", label), |b| {
            b.iter(|| black_box(entity.save_to_vec().unwrap()))
        });

        let mut target = bare_entity(1);
        group.bench_function(BenchmarkId::new("load", label), |b| {
            b.iter(|| black_box(target.load_from_slice(black_box(&bytes)).unwrap()))
        });
    }
    group.finish();
}

fn bench_entity_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_batch");
    for count in [100u32, 1_000] {
        let entities: Vec<Entity> = (0..count).map(populated_entity).collect();
        let mut w = SceneWriter::new();
        for e in &entities {
            e.save(&mut w).unwrap();
        }
        let bytes = w.into_bytes();

        group.bench_with_input(BenchmarkId::new("save", count), &entities, |b, entities| {
            b.iter(|| {
                let mut w = SceneWriter::with_capacity(bytes.len());
                for e in entities {
                    e.save(&mut w).unwrap();
                }
                black_box(w.into_bytes())
            })
        });

        let mut targets: Vec<Entity> = (0..count).map(bare_entity).collect();
        group.bench_with_input(BenchmarkId::new("load", count), &bytes, |b, bytes| {
            b.iter(|| {
                let mut r = SceneReader::new(bytes);
                for t in targets.iter_mut() {
                    black_box(t.load(&mut r).unwrap());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_entity, bench_entity_batch);
criterion_main!(benches);
