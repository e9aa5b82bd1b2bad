use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use survivor_spawn::core::config::SpawnConfig;
use survivor_spawn::core::types::{Position, RegionKey, RunId, TargetId};
use survivor_spawn::spatial::terrain::{BlockKind, Terrain};
use survivor_spawn::spawn::loader::default_settings;
use survivor_spawn::spawn::{PlanBatch, SpawnPlanner, SpawnSnapshot, TargetState};

/// Pillared arena so that most candidates are hidden
fn arena_terrain() -> Terrain {
    let mut terrain = Terrain::default();
    terrain.fill((-48, 63, -48), (47, 63, 47), BlockKind::Solid);
    for px in (-40..=40).step_by(8) {
        for pz in (-40..=40).step_by(8) {
            terrain.fill((px, 64, pz), (px + 1, 66, pz + 1), BlockKind::Solid);
        }
    }
    terrain
}

fn batch(targets: usize, terrain: &Terrain) -> PlanBatch {
    let regions = [RegionKey::new("arena_1"), RegionKey::new("arena_2")];
    let snapshots = (0..targets)
        .map(|i| {
            let position = Position::new((i % 9) as f32 - 4.0, 64.0, (i / 9 % 9) as f32 - 4.0);
            let state = TargetState {
                target: TargetId::new(),
                run: RunId::new(),
                region: regions[i % regions.len()].clone(),
                position,
                level: 10,
                team_average_level: 10.0,
                nearby_allies: 2,
                nearby_hostiles: 0,
                elapsed_seconds: 300,
                min_enemy_level: 1,
            };
            SpawnSnapshot::capture(&state, 0, Some(terrain.capture(position, 25.0)))
        })
        .collect();
    PlanBatch::new(snapshots, 42)
}

fn bench_plan_batch(c: &mut Criterion) {
    let settings = default_settings().expect("built-in settings parse");
    let terrain = arena_terrain();
    let mut group = c.benchmark_group("plan_batch");

    for targets in [16usize, 128, 512] {
        let batch = batch(targets, &terrain);
        for (label, threshold) in [("sequential", usize::MAX), ("parallel", 1)] {
            let planner = SpawnPlanner::new(
                SpawnConfig {
                    parallel_threshold: threshold,
                    ..settings.config.clone()
                },
                settings.catalog.clone(),
            );
            group.bench_with_input(BenchmarkId::new(label, targets), &batch, |b, batch| {
                b.iter(|| black_box(planner.plan(batch)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_plan_batch);
criterion_main!(benches);
