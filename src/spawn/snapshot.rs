//! Values that cross the simulation-thread boundary
//!
//! A `SpawnSnapshot` is captured on the simulation thread and read by the
//! plan phase; a `SpawnDecision` is produced by the plan phase and consumed
//! once by the apply phase. Both own every value they hold, so neither can
//! observe later changes to live world state.

use std::sync::Arc;

use crate::core::types::{Position, RegionKey, RunId, TargetId};
use crate::spatial::terrain::TerrainSnapshot;
use crate::spawn::archetype::ArchetypeDef;
use crate::spawn::host::TargetState;

/// Frozen view of one spawn target at collect time
#[derive(Debug, Clone)]
pub struct SpawnSnapshot {
    target: TargetId,
    run: RunId,
    region: RegionKey,
    position: Position,
    level: u32,
    team_average_level: f32,
    nearby_allies: u32,
    nearby_hostiles: u32,
    elapsed_seconds: u64,
    min_enemy_level: u32,
    region_active_count: u32,
    terrain: Option<Arc<TerrainSnapshot>>,
}

impl SpawnSnapshot {
    /// Copy a target's state together with its region's count at capture time
    ///
    /// `terrain` must already be an owned copy; it is the only sight-line
    /// source the plan phase will consult.
    pub fn capture(
        state: &TargetState,
        region_active_count: u32,
        terrain: Option<TerrainSnapshot>,
    ) -> Self {
        Self {
            target: state.target,
            run: state.run,
            region: state.region.clone(),
            position: state.position,
            level: state.level,
            team_average_level: state.team_average_level,
            nearby_allies: state.nearby_allies,
            nearby_hostiles: state.nearby_hostiles,
            elapsed_seconds: state.elapsed_seconds,
            min_enemy_level: state.min_enemy_level,
            region_active_count,
            terrain: terrain.map(Arc::new),
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn region(&self) -> &RegionKey {
        &self.region
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn team_average_level(&self) -> f32 {
        self.team_average_level
    }

    pub fn nearby_allies(&self) -> u32 {
        self.nearby_allies
    }

    pub fn nearby_hostiles(&self) -> u32 {
        self.nearby_hostiles
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn min_enemy_level(&self) -> u32 {
        self.min_enemy_level
    }

    pub fn region_active_count(&self) -> u32 {
        self.region_active_count
    }

    pub fn terrain(&self) -> Option<&TerrainSnapshot> {
        self.terrain.as_deref()
    }

    /// Would an enemy at `candidate` be directly visible to the target?
    ///
    /// False when no terrain was captured (sight-line checks disabled).
    pub fn is_visible_from(&self, candidate: Position) -> bool {
        self.terrain
            .as_ref()
            .is_some_and(|terrain| terrain.has_line_of_sight(candidate, self.position))
    }
}

/// Plan to create exactly one enemy
#[derive(Debug, Clone)]
pub struct SpawnDecision {
    target: TargetId,
    run: RunId,
    region: RegionKey,
    destination: Position,
    archetype: Arc<ArchetypeDef>,
    level: u32,
}

impl SpawnDecision {
    pub fn new(
        snapshot: &SpawnSnapshot,
        destination: Position,
        archetype: Arc<ArchetypeDef>,
        level: u32,
    ) -> Self {
        Self {
            target: snapshot.target,
            run: snapshot.run,
            region: snapshot.region.clone(),
            destination,
            archetype,
            level,
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn region(&self) -> &RegionKey {
        &self.region
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    pub fn archetype(&self) -> &Arc<ArchetypeDef> {
        &self.archetype
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}
