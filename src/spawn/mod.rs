//! Enemy spawn pipeline
//!
//! Collect (simulation thread) -> plan (any thread) -> apply (simulation thread).

pub mod archetype;
pub mod host;
pub mod loader;
pub mod orchestrator;
pub mod planner;
pub mod region;
pub mod snapshot;
pub mod suppression;

pub use archetype::{ArchetypeCatalog, ArchetypeDef, SpawnConstraints};
pub use host::{
    ArchetypeSource, RemovalHook, SpawnHost, SpawnRequest, TargetProvider, TargetState, WorldApi,
};
pub use loader::{load_settings, SpawnSettings};
pub use orchestrator::{CycleReport, PlanDispatch, SpawnOrchestrator};
pub use planner::{PlanBatch, SpawnPlanner};
pub use region::{RegionRegistry, RegionSpawnState, RegionStatus};
pub use snapshot::{SpawnDecision, SpawnSnapshot};
pub use suppression::{SuppressionState, SuppressionZone};
