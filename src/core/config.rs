//! Spawner configuration with documented constants
//!
//! All tuning numbers for the spawn pipeline are collected here with
//! explanations of their purpose and how they interact with each other.

use serde::Deserialize;

use crate::core::error::{Result, SpawnError};

/// Upper bound for `max_spawn_distance`; terrain capture grows with its square
pub const MAX_SPAWN_DISTANCE: f32 = 512.0;

/// Upper bound for `vertical_range`, the full build height of a region
pub const MAX_VERTICAL_RANGE: i32 = 384;

/// Configuration for the spawn pipeline
///
/// Every field has a default, so a TOML `[spawning]` table only needs
/// to name the values it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    // === LOOP ===
    /// Master switch. When false, `run_cycle` does nothing.
    pub enabled: bool,

    /// Simulation ticks between two cycle invocations
    ///
    /// Read by whoever drives the orchestrator; the pipeline itself
    /// never sleeps or schedules.
    pub cycle_interval_ticks: u32,

    // === LIMITS ===
    /// Maximum concurrently alive spawned enemies per region
    ///
    /// Checked optimistically at collect and plan time, and
    /// authoritatively at apply time.
    pub max_active_per_region: u32,

    /// Desired enemies around a level-1 team
    pub target_mobs_per_target: u32,

    /// Extra desired enemies per team level above 1
    ///
    /// At 0.5 a level-9 team wants 10 + 8 × 0.5 = 14 enemies nearby.
    pub target_mobs_increase_per_level: f32,

    /// Upper bound for the per-target desired enemy count
    pub target_mobs_max: u32,

    /// Maximum realizations per poll; the rest carry over to the next poll
    pub max_spawns_per_tick: usize,

    /// Radius used by target providers to count nearby hostiles
    pub mob_count_radius: f32,

    // === POSITIONING ===
    /// Inner radius of the spawn annulus (no spawning on top of the target)
    pub min_spawn_distance: f32,

    /// Outer radius of the spawn annulus
    ///
    /// Also the radius of the terrain captured for sight-line checks, so
    /// larger values make collection more expensive.
    pub max_spawn_distance: f32,

    /// Candidate points tried per target before giving up this cycle
    pub max_sample_attempts: u32,

    /// How far above or below the target's height a standing spot may be
    pub vertical_range: i32,

    /// Reject candidates the target can see directly
    ///
    /// When false no terrain is captured and candidates stay at the
    /// target's height.
    pub line_of_sight_checks: bool,

    // === LEVEL CALCULATION ===
    /// Radius used by target providers to average team levels
    pub level_sampling_radius: f32,

    /// Weight of the team average level
    pub avg_level_multiplier: f32,

    /// Weight of the target's own level
    ///
    /// 0.0 by default: the team average already contains it.
    pub target_level_multiplier: f32,

    /// Added per nearby ally, so groups face tougher enemies
    pub ally_count_multiplier: f32,

    /// Flat offset applied before clamping
    pub level_offset: i32,

    /// Global floor for enemy levels
    pub min_enemy_level: u32,

    /// Global ceiling for enemy levels
    pub max_enemy_level: u32,

    /// Enable escalation with run duration
    pub time_scaling: bool,

    /// Seconds of run time per escalation step
    pub time_step_seconds: u64,

    /// Levels added per escalation step
    pub level_per_step: u32,

    // === PARALLELIZATION ===
    /// Minimum batch size before planning fans out over rayon
    ///
    /// Below this threshold, thread overhead exceeds benefits.
    pub parallel_threshold: usize,

    /// Seed for the orchestrator's cycle RNG; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_interval_ticks: 20,

            max_active_per_region: 60,
            target_mobs_per_target: 10,
            target_mobs_increase_per_level: 0.5,
            target_mobs_max: 30,
            max_spawns_per_tick: 20,
            mob_count_radius: 30.0,

            min_spawn_distance: 8.0,
            max_spawn_distance: 25.0,
            max_sample_attempts: 10,
            vertical_range: 4,
            line_of_sight_checks: true,

            level_sampling_radius: 50.0,
            avg_level_multiplier: 1.0,
            target_level_multiplier: 0.0,
            ally_count_multiplier: 0.2,
            level_offset: 0,
            min_enemy_level: 1,
            max_enemy_level: 100,
            time_scaling: true,
            time_step_seconds: 60,
            level_per_step: 1,

            parallel_threshold: 64,
            seed: None,
        }
    }
}

#[derive(Deserialize)]
struct SpawnConfigFile {
    #[serde(default)]
    spawning: SpawnConfig,
}

impl SpawnConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `[spawning]` table of a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SpawnConfigFile = toml::from_str(content)?;
        file.spawning.validate()?;
        Ok(file.spawning)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.min_spawn_distance.is_nan()
            || self.min_spawn_distance < 0.0
            || !self.max_spawn_distance.is_finite()
        {
            return Err(SpawnError::Config(
                "spawn distances must be finite and non-negative".into(),
            ));
        }

        if self.max_spawn_distance > MAX_SPAWN_DISTANCE {
            return Err(SpawnError::Config(format!(
                "max_spawn_distance ({}) should be <= {}",
                self.max_spawn_distance, MAX_SPAWN_DISTANCE
            )));
        }

        if self.min_spawn_distance >= self.max_spawn_distance {
            return Err(SpawnError::Config(format!(
                "min_spawn_distance ({}) should be < max_spawn_distance ({})",
                self.min_spawn_distance, self.max_spawn_distance
            )));
        }

        if self.min_enemy_level > self.max_enemy_level {
            return Err(SpawnError::Config(format!(
                "min_enemy_level ({}) should be <= max_enemy_level ({})",
                self.min_enemy_level, self.max_enemy_level
            )));
        }

        if self.time_scaling && self.time_step_seconds == 0 {
            return Err(SpawnError::Config(
                "time_step_seconds must be positive when time_scaling is on".into(),
            ));
        }

        if self.max_sample_attempts == 0 {
            return Err(SpawnError::Config("max_sample_attempts must be positive".into()));
        }

        if !(0..=MAX_VERTICAL_RANGE).contains(&self.vertical_range) {
            return Err(SpawnError::Config(format!(
                "vertical_range ({}) should be within 0..={}",
                self.vertical_range, MAX_VERTICAL_RANGE
            )));
        }

        if self.max_spawns_per_tick == 0 {
            return Err(SpawnError::Config("max_spawns_per_tick must be positive".into()));
        }

        Ok(())
    }

    /// Desired number of enemies around a target for a team average level
    ///
    /// `floor(base + (level - 1) * increase)`, capped at `target_mobs_max`.
    pub fn target_mobs_for_level(&self, avg_team_level: f32) -> u32 {
        let target = self.target_mobs_per_target as f32
            + (avg_team_level - 1.0) * self.target_mobs_increase_per_level;
        (target.floor().max(0.0) as u32).min(self.target_mobs_max)
    }
}
