//! Interfaces the pipeline consumes from its host simulation
//!
//! `TargetProvider` and `WorldApi` are only ever called from the simulation
//! thread: the orchestrator borrows the host for the duration of a collect
//! or apply phase and never moves it into the plan phase.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::{EntityHandle, Position, RegionKey, RunId, TargetId};
use crate::spatial::terrain::TerrainSnapshot;
use crate::spawn::archetype::ArchetypeDef;

/// Raw per-target fields read from the player-state store
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    pub target: TargetId,
    pub run: RunId,
    pub region: RegionKey,
    pub position: Position,
    pub level: u32,
    pub team_average_level: f32,
    pub nearby_allies: u32,
    pub nearby_hostiles: u32,
    pub elapsed_seconds: u64,
    pub min_enemy_level: u32,
}

/// Player-state store
pub trait TargetProvider {
    /// Regions that currently host at least one run
    fn regions(&self) -> Vec<RegionKey>;

    /// Targets in a qualifying activity state inside `region`
    fn list_eligible_targets(&self, region: &RegionKey) -> Vec<TargetId>;

    /// Current state of a target; None once it is gone or no longer eligible
    fn target_state(&self, target: TargetId) -> Option<TargetState>;
}

/// Read-only archetype configuration
pub trait ArchetypeSource {
    /// Archetypes whose level range overlaps `levels`
    fn archetypes_for(&self, levels: RangeInclusive<u32>) -> Vec<Arc<ArchetypeDef>>;

    /// Archetypes accepting exactly `level` that may appear in `region`
    fn eligible(&self, level: u32, region: &RegionKey) -> Vec<Arc<ArchetypeDef>> {
        self.archetypes_for(level..=level)
            .into_iter()
            .filter(|a| a.is_allowed_in(region))
            .collect()
    }
}

/// Everything the world needs to realize one planned enemy
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub region: RegionKey,
    pub run: RunId,
    pub target: TargetId,
    pub position: Position,
    pub archetype: Arc<ArchetypeDef>,
    pub level: u32,
}

/// Fired once when a realized entity leaves the world
pub type RemovalHook = Box<dyn FnOnce(EntityHandle) + Send + 'static>;

/// World mutation surface
pub trait WorldApi {
    /// Create the entity, tagged with its region and run
    fn spawn_entity(&mut self, request: &SpawnRequest) -> Result<EntityHandle>;

    /// Register a hook to run when `handle` is removed or killed
    fn on_entity_removed(&mut self, handle: EntityHandle, hook: RemovalHook);

    /// Copy the loaded terrain around `center`; None if the region has no terrain
    fn capture_terrain(
        &self,
        region: &RegionKey,
        center: Position,
        radius: f32,
    ) -> Option<TerrainSnapshot>;
}

/// A host that is both player-state store and world
///
/// Implemented for every type providing both halves.
pub trait SpawnHost: TargetProvider + WorldApi {}

impl<T: TargetProvider + WorldApi + ?Sized> SpawnHost for T {}
