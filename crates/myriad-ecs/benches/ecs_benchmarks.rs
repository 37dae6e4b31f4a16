//! Entity manager throughput benchmarks.
//!
//! - Bulk creation of entities carrying two components.
//! - Random create/add/detach/remove churn with two systems observing.
//! - Dense iteration over one store versus per-entity tuple lookups.
//!
//! The churn benchmark draws from a seeded PCG generator so every run replays
//! the same operation sequence.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use myriad_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f64,
    dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Health(u32);

#[derive(Default)]
struct Counter {
    matched: usize,
}

impl System for Counter {
    fn on_entity_addition(&mut self, _entity: Entity) {
        self.matched += 1;
    }

    fn on_entity_removal(&mut self, _entity: Entity) {
        self.matched -= 1;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn populated(entity_count: usize, capacity: usize) -> (EntityManager, Vec<Entity>) {
    let mut manager: EntityManager = EntityManager::with_capacity(capacity, 8).unwrap();
    let entities = (0..entity_count)
        .map(|i| {
            manager
                .create_entity((
                    Position {
                        x: i as f64,
                        y: 0.0,
                    },
                    Velocity { dx: 1.0, dy: 0.5 },
                ))
                .unwrap()
        })
        .collect();
    (manager, entities)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_entities");
    for &count in &[1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(populated(count, count)));
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    const CAPACITY: usize = 4_096;
    const OPS: usize = 10_000;

    c.bench_function("churn_with_systems", |b| {
        b.iter_batched(
            || {
                let (mut manager, entities) = populated(CAPACITY / 2, CAPACITY);
                manager
                    .create_system::<(Position, Velocity), _>(Counter::default())
                    .unwrap();
                manager.create_system::<(Health,), _>(Counter::default()).unwrap();
                (manager, entities, Pcg64::seed_from_u64(0x5eed))
            },
            |(mut manager, mut entities, mut rng)| {
                for _ in 0..OPS {
                    let pick = rng.gen_range(0..entities.len().max(1));
                    match rng.gen_range(0..4u8) {
                        0 => {
                            if let Ok(e) = manager.create_entity((Health(1),)) {
                                entities.push(e);
                            }
                        }
                        1 if !entities.is_empty() => {
                            let _ = manager.add_components(entities[pick], (Health(2),));
                        }
                        2 if !entities.is_empty() => {
                            let _ = manager.detach_components::<(Velocity,)>(entities[pick]);
                        }
                        3 if !entities.is_empty() => {
                            let e = entities.swap_remove(pick);
                            let _ = manager.remove_entity(e);
                        }
                        _ => {}
                    }
                }
                black_box(manager.entity_count())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_iterate(c: &mut Criterion) {
    let (mut manager, entities) = populated(10_000, 10_000);
    let mut group = c.benchmark_group("iterate_10k");

    group.bench_function("dense_values", |b| {
        b.iter(|| {
            for pos in manager.get_components_mut::<Position>().unwrap() {
                pos.x += 1.0;
            }
        });
    });

    group.bench_function("entity_tuples", |b| {
        b.iter(|| {
            for &e in &entities {
                let (pos, vel) = manager
                    .get_entity_components_mut::<(Position, Velocity)>(e)
                    .unwrap();
                pos.x += vel.dx;
                pos.y += vel.dy;
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create, bench_churn, bench_iterate);
criterion_main!(benches);
