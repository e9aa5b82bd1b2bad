//! Spawn Simulator
//!
//! Runs the spawn pipeline against the sandbox world: a few players per
//! region walk around a pillared arena while enemies are planned off the
//! simulation thread and periodically killed. Prints a JSON summary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::runtime::Runtime;

use survivor_spawn::core::error::Result;
use survivor_spawn::core::types::{Position, RegionKey};
use survivor_spawn::sandbox::SandboxWorld;
use survivor_spawn::spatial::terrain::{BlockKind, Terrain};
use survivor_spawn::spawn::loader::{default_settings, load_settings};
use survivor_spawn::spawn::{CycleReport, PlanDispatch, RegionStatus, SpawnOrchestrator};

/// Spawn Simulator - exercise the spawn pipeline headlessly
#[derive(Parser, Debug)]
#[command(name = "spawn_sim")]
#[command(about = "Simulate enemy spawning around players in sandbox arenas")]
struct Args {
    /// Settings file with [spawning] and [[archetypes]]; built-in when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulation ticks to run (20 per second)
    #[arg(long, default_value_t = 2400)]
    ticks: u64,

    /// Number of arenas
    #[arg(long, default_value_t = 2)]
    regions: usize,

    /// Players per arena
    #[arg(long, default_value_t = 3)]
    players: usize,

    /// Ticks between kills of the oldest enemy in each arena (0 disables)
    #[arg(long, default_value_t = 40)]
    kill_every: u64,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Plan on the simulation thread instead of the blocking pool
    #[arg(long)]
    inline: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct SimOutput {
    ticks: u64,
    totals: CycleReport,
    spawned_by_archetype: Vec<(String, usize)>,
    alive: usize,
    regions: Vec<RegionStatus>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "survivor_spawn=debug"
    } else {
        "survivor_spawn=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &args.config {
        Some(path) => load_settings(path)?,
        None => default_settings()?,
    };
    if args.seed.is_some() {
        settings.config.seed = args.seed;
    }

    let rt = Runtime::new()?;
    let dispatch = if args.inline {
        PlanDispatch::Inline
    } else {
        PlanDispatch::Runtime(rt.handle().clone())
    };

    let cycle_interval = u64::from(settings.config.cycle_interval_ticks.max(1));
    let mut world = SandboxWorld::for_config(&settings.config);
    let mut orchestrator = SpawnOrchestrator::new(settings.config, settings.catalog, dispatch)?;
    let mut rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let regions = setup_arenas(&mut world, &mut rng, args.regions, args.players);
    tracing::info!(
        "Simulating {} ticks over {} arenas",
        args.ticks,
        regions.len()
    );

    let mut totals = CycleReport::default();
    let mut spawned: Vec<(String, usize)> = Vec::new();

    for _ in 0..args.ticks {
        world.tick();
        wander_players(&mut world, &mut rng);

        let before = world.mob_count();
        let report = if world.current_tick % cycle_interval == 0 {
            orchestrator.run_cycle(&mut world)
        } else {
            orchestrator.poll(&mut world)
        };
        if world.mob_count() > before {
            record_new_spawns(&world, world.current_tick, &mut spawned);
        }
        totals.absorb(report);

        if args.kill_every > 0 && world.current_tick % args.kill_every == 0 {
            for region in &regions {
                kill_oldest(&mut world, region);
            }
        }
    }

    let report = orchestrator.drain(&mut world, Duration::from_secs(5));
    totals.absorb(report);
    orchestrator.shutdown();

    spawned.sort();
    let output = SimOutput {
        ticks: args.ticks,
        totals,
        spawned_by_archetype: spawned,
        alive: world.mob_count(),
        regions: orchestrator.region_status(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Stone floor with 2x2 pillars every eight blocks for cover
fn build_arena(terrain: &mut Terrain) {
    terrain.fill((-48, 63, -48), (47, 63, 47), BlockKind::Solid);
    for px in (-40..=40).step_by(8) {
        for pz in (-40..=40).step_by(8) {
            if px == 0 && pz == 0 {
                continue;
            }
            terrain.fill((px, 64, pz), (px + 1, 66, pz + 1), BlockKind::Solid);
        }
    }
}

fn setup_arenas(
    world: &mut SandboxWorld,
    rng: &mut ChaCha8Rng,
    regions: usize,
    players: usize,
) -> Vec<RegionKey> {
    (0..regions)
        .map(|i| {
            let region = RegionKey::new(&format!("arena_{}", i + 1));
            build_arena(world.terrain_mut(&region));

            let run = world.start_run(1 + i as u32 * 5);
            for p in 0..players {
                let position = Position::new(
                    rng.gen_range(-6.0..6.0),
                    64.0,
                    rng.gen_range(-6.0..6.0),
                );
                let level = rng.gen_range(1..=10);
                world.add_player(&format!("player_{}_{}", i + 1, p + 1), run, &region, position, level);
            }
            region
        })
        .collect()
}

fn wander_players(world: &mut SandboxWorld, rng: &mut ChaCha8Rng) {
    let moves: Vec<_> = world
        .players()
        .map(|p| (p.id, p.position))
        .collect();

    for (id, position) in moves {
        let step = Position::new(rng.gen_range(-0.2..0.2), 0.0, rng.gen_range(-0.2..0.2));
        let next = (position + step).clamp(
            Position::new(-20.0, 64.0, -20.0),
            Position::new(20.0, 64.0, 20.0),
        );
        if world.move_player(id, next).is_err() {
            tracing::warn!("Player {:?} vanished while moving", id);
        }
    }
}

fn record_new_spawns(world: &SandboxWorld, tick: u64, spawned: &mut Vec<(String, usize)>) {
    for mob in world.mobs().filter(|mob| mob.spawned_at == tick) {
        match spawned.iter_mut().find(|(id, _)| *id == mob.archetype) {
            Some((_, count)) => *count += 1,
            None => spawned.push((mob.archetype.clone(), 1)),
        }
    }
}

fn kill_oldest(world: &mut SandboxWorld, region: &RegionKey) {
    let oldest = world
        .mobs()
        .filter(|mob| mob.region == *region)
        .min_by_key(|mob| (mob.spawned_at, mob.handle.0))
        .map(|mob| mob.handle);

    if let Some(handle) = oldest {
        if let Err(e) = world.remove_entity(handle) {
            tracing::warn!("Failed to remove {:?}: {}", handle, e);
        }
    }
}
