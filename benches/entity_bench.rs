#![allow(dead_code)]
//! Benchmarks for the entity/component layer

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use handle_ecs::{ComponentMask, EntityManager};

#[derive(Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

fn bench_entity_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity");

    group.bench_function("create_1k_two_components", |b| {
        b.iter(|| {
            let mut manager = EntityManager::new();
            for i in 0..1_000 {
                let e = manager.create_entity();
                let _ = manager.add_component(
                    e,
                    Position {
                        x: i as f32,
                        y: 0.0,
                        z: 0.0,
                    },
                );
                let _ = manager.add_component(
                    e,
                    Velocity {
                        x: 1.0,
                        y: 0.0,
                        z: 0.0,
                    },
                );
            }
            black_box(manager.entity_count())
        });
    });

    group.bench_function("create_destroy_1k_cascade", |b| {
        b.iter(|| {
            let mut manager = EntityManager::new();
            let entities: Vec<_> = (0..1_000)
                .map(|i| {
                    let e = manager.create_entity();
                    let _ = manager.add_component(
                        e,
                        Position {
                            x: i as f32,
                            y: 0.0,
                            z: 0.0,
                        },
                    );
                    e
                })
                .collect();
            for e in entities {
                manager.destroy_entity(e);
            }
            black_box(manager.entity_count())
        });
    });
    group.finish();
}

fn bench_component_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("components");

    let mut manager = EntityManager::new();
    for i in 0..10_000 {
        let e = manager.create_entity();
        let _ = manager.add_component(
            e,
            Position {
                x: i as f32,
                y: 0.0,
                z: 0.0,
            },
        );
        if i % 2 == 0 {
            let _ = manager.add_component(
                e,
                Velocity {
                    x: 1.0,
                    y: 0.0,
                    z: 0.0,
                },
            );
        }
    }

    group.bench_function("dense_iterate_10k", |b| {
        b.iter(|| {
            let store = manager.components::<Position>().unwrap();
            let sum: f32 = store.iter().map(|r| r.component.x).sum();
            black_box(sum)
        });
    });

    let pos_tag = manager.component_type_id::<Position>().unwrap();
    let vel_tag = manager.component_type_id::<Velocity>().unwrap();
    let query = ComponentMask::empty().with(pos_tag).with(vel_tag);

    group.bench_function("mask_query_movers", |b| {
        b.iter(|| black_box(manager.entities_with_all(query).len()));
    });
    group.finish();
}

fn bench_data_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_components");

    group.bench_function("add_1k_blob_records", |b| {
        b.iter(|| {
            let mut manager = EntityManager::new();
            let tag = manager.create_data_store(0, 48, 1_024).unwrap();
            for _ in 0..1_000 {
                let e = manager.create_entity();
                let _ = manager.add_data_component(tag, e);
            }
            black_box(manager.data_components(tag).unwrap().len())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_entity_lifecycle,
    bench_component_iteration,
    bench_data_components
);
criterion_main!(benches);
