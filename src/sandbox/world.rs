//! Sandbox world - in-memory host for the spawn pipeline
//!
//! Plays both host roles: it is the player-state store (`TargetProvider`)
//! and the world that realizes enemies (`WorldApi`). Used by the demo
//! binary, the benches and the integration tests.

use ahash::AHashMap;

use crate::core::config::SpawnConfig;
use crate::core::error::{Result, SpawnError};
use crate::core::types::{EntityHandle, Position, RegionKey, RunId, TargetId, Tick};
use crate::spatial::sparse_hash::SparseHashGrid;
use crate::spatial::terrain::{ChunkPos, Terrain, TerrainSnapshot};
use crate::spawn::host::{RemovalHook, SpawnRequest, TargetProvider, TargetState, WorldApi};

/// Simulation ticks per second of run time
pub const TICKS_PER_SECOND: u64 = 20;

const GRID_CELL_SIZE: f32 = 16.0;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: TargetId,
    pub name: String,
    pub run: RunId,
    pub region: RegionKey,
    pub position: Position,
    pub level: u32,
    /// Only players inside a run are spawn targets
    pub in_run: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RunInfo {
    pub started_at: Tick,
    /// Stage-imposed minimum enemy level
    pub min_enemy_level: u32,
}

/// A realized enemy
#[derive(Debug, Clone)]
pub struct Mob {
    pub handle: EntityHandle,
    pub region: RegionKey,
    pub run: RunId,
    pub target: TargetId,
    pub archetype: String,
    pub enemy_type: String,
    pub level: u32,
    pub position: Position,
    pub spawned_at: Tick,
}

pub struct SandboxWorld {
    pub current_tick: Tick,
    players: Vec<Player>,
    player_index: AHashMap<TargetId, usize>,
    runs: AHashMap<RunId, RunInfo>,
    terrain: AHashMap<RegionKey, Terrain>,
    mobs: AHashMap<EntityHandle, Mob>,
    mob_grids: AHashMap<RegionKey, SparseHashGrid<EntityHandle>>,
    removal_hooks: AHashMap<EntityHandle, RemovalHook>,
    next_handle: u64,
    mob_count_radius: f32,
    level_sampling_radius: f32,
    refuse_spawns: bool,
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self::with_radii(30.0, 50.0)
    }

    /// Use the counting radii a spawn configuration expects
    pub fn for_config(config: &SpawnConfig) -> Self {
        Self::with_radii(config.mob_count_radius, config.level_sampling_radius)
    }

    pub fn with_radii(mob_count_radius: f32, level_sampling_radius: f32) -> Self {
        Self {
            current_tick: 0,
            players: Vec::new(),
            player_index: AHashMap::new(),
            runs: AHashMap::new(),
            terrain: AHashMap::new(),
            mobs: AHashMap::new(),
            mob_grids: AHashMap::new(),
            removal_hooks: AHashMap::new(),
            next_handle: 1,
            mob_count_radius,
            level_sampling_radius,
            refuse_spawns: false,
        }
    }

    pub fn tick(&mut self) {
        self.current_tick += 1;
    }

    /// Advance the clock by whole seconds of run time
    pub fn advance_seconds(&mut self, seconds: u64) {
        self.current_tick += seconds * TICKS_PER_SECOND;
    }

    pub fn start_run(&mut self, min_enemy_level: u32) -> RunId {
        let run = RunId::new();
        self.runs.insert(
            run,
            RunInfo {
                started_at: self.current_tick,
                min_enemy_level,
            },
        );
        run
    }

    pub fn elapsed_seconds(&self, run: RunId) -> u64 {
        self.runs.get(&run).map_or(0, |info| {
            self.current_tick.saturating_sub(info.started_at) / TICKS_PER_SECOND
        })
    }

    pub fn add_player(
        &mut self,
        name: &str,
        run: RunId,
        region: &RegionKey,
        position: Position,
        level: u32,
    ) -> TargetId {
        let id = TargetId::new();
        self.player_index.insert(id, self.players.len());
        self.players.push(Player {
            id,
            name: name.to_string(),
            run,
            region: region.clone(),
            position,
            level,
            in_run: true,
        });
        id
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.players.iter()
    }

    pub fn player(&self, id: TargetId) -> Option<&Player> {
        self.player_index.get(&id).map(|&index| &self.players[index])
    }

    fn player_mut(&mut self, id: TargetId) -> Result<&mut Player> {
        let index = *self
            .player_index
            .get(&id)
            .ok_or(SpawnError::UnknownTarget(id))?;
        Ok(&mut self.players[index])
    }

    pub fn move_player(&mut self, id: TargetId, position: Position) -> Result<()> {
        self.player_mut(id)?.position = position;
        Ok(())
    }

    pub fn set_player_region(&mut self, id: TargetId, region: &RegionKey) -> Result<()> {
        self.player_mut(id)?.region = region.clone();
        Ok(())
    }

    pub fn set_player_run(&mut self, id: TargetId, run: RunId) -> Result<()> {
        self.player_mut(id)?.run = run;
        Ok(())
    }

    /// Enter or leave the run (leaving makes the player ineligible)
    pub fn set_in_run(&mut self, id: TargetId, in_run: bool) -> Result<()> {
        self.player_mut(id)?.in_run = in_run;
        Ok(())
    }

    /// Live terrain of a region, created empty on first use
    pub fn terrain_mut(&mut self, region: &RegionKey) -> &mut Terrain {
        self.terrain.entry(region.clone()).or_default()
    }

    pub fn unload_chunk(&mut self, region: &RegionKey, chunk: ChunkPos) -> Result<()> {
        self.terrain
            .get_mut(region)
            .ok_or_else(|| SpawnError::UnknownRegion(region.clone()))?
            .unload_chunk(chunk);
        Ok(())
    }

    /// Make every following `spawn_entity` fail
    pub fn set_refuse_spawns(&mut self, refuse: bool) {
        self.refuse_spawns = refuse;
    }

    pub fn mob(&self, handle: EntityHandle) -> Option<&Mob> {
        self.mobs.get(&handle)
    }

    pub fn mobs(&self) -> impl Iterator<Item = &Mob> + '_ {
        self.mobs.values()
    }

    pub fn mob_count(&self) -> usize {
        self.mobs.len()
    }

    pub fn mob_count_in(&self, region: &RegionKey) -> usize {
        self.mobs.values().filter(|mob| mob.region == *region).count()
    }

    /// Remove an enemy from the world, firing its removal hook once
    pub fn remove_entity(&mut self, handle: EntityHandle) -> Result<Mob> {
        let mob = self
            .mobs
            .remove(&handle)
            .ok_or(SpawnError::UnknownEntity(handle))?;

        if let Some(grid) = self.mob_grids.get_mut(&mob.region) {
            grid.remove(handle, mob.position);
        }
        if let Some(hook) = self.removal_hooks.remove(&handle) {
            hook(handle);
        }
        Ok(mob)
    }

    /// Remove every enemy in a region; returns how many were removed
    pub fn kill_all(&mut self, region: &RegionKey) -> usize {
        let handles: Vec<_> = self
            .mobs
            .values()
            .filter(|mob| mob.region == *region)
            .map(|mob| mob.handle)
            .collect();

        handles
            .into_iter()
            .filter(|&handle| self.remove_entity(handle).is_ok())
            .count()
    }

    /// Run members near `player` in the same region, `player` included
    fn team_of<'a>(&'a self, player: &'a Player) -> impl Iterator<Item = &'a Player> + 'a {
        let center = player.position;
        let radius_sq = self.level_sampling_radius * self.level_sampling_radius;
        self.players.iter().filter(move |other| {
            other.in_run
                && other.run == player.run
                && other.region == player.region
                && other.position.distance_squared(center) <= radius_sq
        })
    }
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetProvider for SandboxWorld {
    fn regions(&self) -> Vec<RegionKey> {
        let mut regions: Vec<RegionKey> = self
            .players
            .iter()
            .filter(|p| p.in_run)
            .map(|p| p.region.clone())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    fn list_eligible_targets(&self, region: &RegionKey) -> Vec<TargetId> {
        self.players
            .iter()
            .filter(|p| p.in_run && p.region == *region)
            .map(|p| p.id)
            .collect()
    }

    fn target_state(&self, target: TargetId) -> Option<TargetState> {
        let player = self.player(target).filter(|p| p.in_run)?;
        let run = self.runs.get(&player.run)?;

        let (team_size, level_sum) = self
            .team_of(player)
            .fold((0u32, 0u32), |(n, sum), p| (n + 1, sum + p.level));
        let team_average_level = if team_size == 0 {
            player.level as f32
        } else {
            level_sum as f32 / team_size as f32
        };

        let nearby_hostiles = self
            .mob_grids
            .get(&player.region)
            .map_or(0, |grid| grid.count_within(player.position, self.mob_count_radius));

        Some(TargetState {
            target,
            run: player.run,
            region: player.region.clone(),
            position: player.position,
            level: player.level,
            team_average_level,
            nearby_allies: team_size.saturating_sub(1),
            nearby_hostiles: nearby_hostiles as u32,
            elapsed_seconds: self.elapsed_seconds(player.run),
            min_enemy_level: run.min_enemy_level,
        })
    }
}

impl WorldApi for SandboxWorld {
    fn spawn_entity(&mut self, request: &SpawnRequest) -> Result<EntityHandle> {
        if self.refuse_spawns {
            return Err(SpawnError::Realization("world is refusing spawns".into()));
        }
        if let Some(terrain) = self.terrain.get(&request.region) {
            if !terrain.is_position_loaded(request.position) {
                return Err(SpawnError::ChunkNotLoaded {
                    region: request.region.clone(),
                    position: request.position,
                });
            }
        }

        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;

        self.mob_grids
            .entry(request.region.clone())
            .or_insert_with(|| SparseHashGrid::new(GRID_CELL_SIZE))
            .insert(handle, request.position);
        self.mobs.insert(
            handle,
            Mob {
                handle,
                region: request.region.clone(),
                run: request.run,
                target: request.target,
                archetype: request.archetype.id.clone(),
                enemy_type: request.archetype.enemy_type.clone(),
                level: request.level,
                position: request.position,
                spawned_at: self.current_tick,
            },
        );

        Ok(handle)
    }

    fn on_entity_removed(&mut self, handle: EntityHandle, hook: RemovalHook) {
        if self.mobs.contains_key(&handle) {
            self.removal_hooks.insert(handle, hook);
        } else {
            // Already gone
            hook(handle);
        }
    }

    fn capture_terrain(
        &self,
        region: &RegionKey,
        center: Position,
        radius: f32,
    ) -> Option<TerrainSnapshot> {
        self.terrain
            .get(region)
            .map(|terrain| terrain.capture(center, radius))
    }
}
