//! Spawn planning
//!
//! Pure transformation from a batch of snapshots to spawn decisions. Safe
//! to run on any thread: it reads only the batch, its own configuration
//! and its archetype source, and returns owned decisions.
//!
//! Per target, independently:
//! 1. Optimistic pre-checks (region cap as captured, desired population)
//! 2. Enemy level from team level, allies and run duration, clamped
//! 3. Weighted archetype choice among those accepting the level and region
//! 4. Spawn point in an annulus, hidden from the target, outside suppression
//!
//! Each target draws from its own ChaCha stream keyed by its batch index,
//! so a seeded batch plans identically whether or not it runs in parallel.

use std::f32::consts::TAU;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::core::config::SpawnConfig;
use crate::core::error::{Result, SpawnError};
use crate::core::types::{Position, RegionKey};
use crate::spawn::archetype::{choose_weighted, ArchetypeDef};
use crate::spawn::host::ArchetypeSource;
use crate::spawn::snapshot::{SpawnDecision, SpawnSnapshot};
use crate::spawn::suppression::SuppressionZone;

/// Everything one plan phase needs, owned
#[derive(Debug, Clone)]
pub struct PlanBatch {
    pub snapshots: Vec<SpawnSnapshot>,
    /// Suppression zones active at collect time
    pub zones: Vec<SuppressionZone>,
    pub captured_at: Instant,
    pub seed: u64,
}

impl PlanBatch {
    pub fn new(snapshots: Vec<SpawnSnapshot>, seed: u64) -> Self {
        Self {
            snapshots,
            zones: Vec::new(),
            captured_at: Instant::now(),
            seed,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Planning algorithm bound to one configuration and archetype source
#[derive(Clone)]
pub struct SpawnPlanner {
    config: SpawnConfig,
    archetypes: Arc<dyn ArchetypeSource + Send + Sync>,
}

impl SpawnPlanner {
    pub fn new(
        config: SpawnConfig,
        archetypes: impl ArchetypeSource + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            archetypes: Arc::new(archetypes),
        }
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Plan a whole batch; failures are contained per target
    ///
    /// Decisions come back interleaved round-robin by region.
    pub fn plan(&self, batch: &PlanBatch) -> Vec<SpawnDecision> {
        let plan_one = |(index, snapshot): (usize, &SpawnSnapshot)| {
            let mut rng = ChaCha8Rng::seed_from_u64(batch.seed);
            rng.set_stream(index as u64);
            self.plan_isolated(snapshot, &batch.zones, batch.captured_at, &mut rng)
        };

        let decisions: Vec<Option<SpawnDecision>> =
            if batch.len() >= self.config.parallel_threshold {
                batch.snapshots.par_iter().enumerate().map(plan_one).collect()
            } else {
                batch.snapshots.iter().enumerate().map(plan_one).collect()
            };

        interleave_by_region(decisions.into_iter().flatten().collect())
    }

    fn plan_isolated(
        &self,
        snapshot: &SpawnSnapshot,
        zones: &[SuppressionZone],
        now: Instant,
        rng: &mut ChaCha8Rng,
    ) -> Option<SpawnDecision> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.plan_target(snapshot, zones, now, rng)
        }));

        match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!("Spawn planning failed for target {:?}: {}", snapshot.target(), e);
                None
            }
            Err(_) => {
                tracing::warn!("Spawn planning panicked for target {:?}", snapshot.target());
                None
            }
        }
    }

    /// Plan at most one enemy for one target
    pub fn plan_target<R: Rng + ?Sized>(
        &self,
        snapshot: &SpawnSnapshot,
        zones: &[SuppressionZone],
        now: Instant,
        rng: &mut R,
    ) -> Result<Option<SpawnDecision>> {
        if !snapshot.position().is_finite() || !snapshot.team_average_level().is_finite() {
            return Err(SpawnError::Planning(format!(
                "non-finite input (position {}, team level {})",
                snapshot.position(),
                snapshot.team_average_level()
            )));
        }

        if !self.passes_prechecks(snapshot) {
            return Ok(None);
        }

        let level = self.enemy_level(snapshot);

        let Some(archetype) = self.select_archetype(level, snapshot.region(), rng) else {
            tracing::debug!(
                "No archetype for level {} in region {}",
                level,
                snapshot.region()
            );
            return Ok(None);
        };

        let Some(destination) = self.sample_destination(snapshot, &archetype, zones, now, rng)
        else {
            tracing::debug!(
                "No hidden spawn point for target {:?} after {} attempts",
                snapshot.target(),
                self.config.max_sample_attempts
            );
            return Ok(None);
        };

        Ok(Some(SpawnDecision::new(snapshot, destination, archetype, level)))
    }

    /// Optimistic gates; the apply phase re-checks the cap authoritatively
    pub fn passes_prechecks(&self, snapshot: &SpawnSnapshot) -> bool {
        if snapshot.region_active_count() >= self.config.max_active_per_region {
            tracing::debug!("Region {} at cap during planning", snapshot.region());
            return false;
        }

        let desired = self.config.target_mobs_for_level(snapshot.team_average_level());
        snapshot.nearby_hostiles() < desired
    }

    /// Enemy level for a snapshot, within `[floor, max_enemy_level]`
    ///
    /// The floor is the larger of the global and the context minimum; a
    /// floor above the ceiling collapses to the ceiling.
    pub fn enemy_level(&self, snapshot: &SpawnSnapshot) -> u32 {
        let config = &self.config;

        let mut level = snapshot.team_average_level() * config.avg_level_multiplier
            + snapshot.level() as f32 * config.target_level_multiplier
            + snapshot.nearby_allies() as f32 * config.ally_count_multiplier
            + config.level_offset as f32;

        if config.time_scaling && config.time_step_seconds > 0 {
            let steps = snapshot.elapsed_seconds() / config.time_step_seconds;
            level += steps as f32 * config.level_per_step as f32;
        }

        let ceiling = config.max_enemy_level;
        let floor = config
            .min_enemy_level
            .max(snapshot.min_enemy_level())
            .min(ceiling);

        let rounded = level.round();
        if !rounded.is_finite() || rounded <= floor as f32 {
            floor
        } else if rounded >= ceiling as f32 {
            ceiling
        } else {
            rounded as u32
        }
    }

    pub fn select_archetype<R: Rng + ?Sized>(
        &self,
        level: u32,
        region: &RegionKey,
        rng: &mut R,
    ) -> Option<Arc<ArchetypeDef>> {
        choose_weighted(&self.archetypes.eligible(level, region), rng)
    }

    /// Sample the annulus around the target for a hidden, unsuppressed spot
    pub fn sample_destination<R: Rng + ?Sized>(
        &self,
        snapshot: &SpawnSnapshot,
        archetype: &ArchetypeDef,
        zones: &[SuppressionZone],
        now: Instant,
        rng: &mut R,
    ) -> Option<Position> {
        let (min_distance, max_distance) = archetype
            .spawn
            .narrow(self.config.min_spawn_distance, self.config.max_spawn_distance)?;

        let origin = snapshot.position();
        let origin_y = origin.y.floor() as i32;

        for _ in 0..self.config.max_sample_attempts {
            let angle = rng.gen_range(0.0..TAU);
            let distance = rng.gen_range(min_distance..max_distance);
            let x = origin.x + angle.cos() * distance;
            let z = origin.z + angle.sin() * distance;

            let candidate = match snapshot.terrain() {
                Some(terrain) => {
                    match terrain.find_standing_spot(x, z, origin_y, self.config.vertical_range) {
                        Some(spot) => spot,
                        None => continue,
                    }
                }
                None => Position::new(x, origin.y, z),
            };

            if snapshot.is_visible_from(candidate) {
                continue;
            }

            if zones
                .iter()
                .any(|zone| zone.covers(snapshot.run(), snapshot.region(), candidate, now))
            {
                continue;
            }

            return Some(candidate);
        }

        None
    }
}

impl fmt::Debug for SpawnPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnPlanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Round-robin by region so a per-tick limit is shared fairly
///
/// Regions keep their first-seen order; decisions within a region keep
/// their relative order.
pub fn interleave_by_region(decisions: Vec<SpawnDecision>) -> Vec<SpawnDecision> {
    let mut buckets: Vec<(RegionKey, Vec<SpawnDecision>)> = Vec::new();
    for decision in decisions {
        match buckets.iter_mut().find(|(region, _)| region == decision.region()) {
            Some((_, bucket)) => bucket.push(decision),
            None => buckets.push((decision.region().clone(), vec![decision])),
        }
    }

    let total: usize = buckets.iter().map(|(_, b)| b.len()).sum();
    let mut iters: Vec<_> = buckets.into_iter().map(|(_, b)| b.into_iter()).collect();
    let mut result = Vec::with_capacity(total);
    while result.len() < total {
        for iter in iters.iter_mut() {
            if let Some(decision) = iter.next() {
                result.push(decision);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RunId, TargetId};
    use crate::spatial::terrain::{BlockKind, Terrain};
    use crate::spawn::archetype::{ArchetypeCatalog, SpawnConstraints};
    use crate::spawn::host::TargetState;
    use std::ops::RangeInclusive;
    use std::time::Duration;

    fn catalog() -> ArchetypeCatalog {
        ArchetypeCatalog::new(vec![
            ArchetypeDef::new("zombie", 3.0, 1..=20),
            ArchetypeDef::new("skeleton", 1.0, 5..=100),
        ])
        .unwrap()
    }

    fn planner(config: SpawnConfig) -> SpawnPlanner {
        SpawnPlanner::new(config, catalog())
    }

    fn state(region: &str) -> TargetState {
        TargetState {
            target: TargetId::new(),
            run: RunId::new(),
            region: RegionKey::new(region),
            position: Position::new(0.5, 64.0, 0.5),
            level: 3,
            team_average_level: 3.0,
            nearby_allies: 0,
            nearby_hostiles: 0,
            elapsed_seconds: 0,
            min_enemy_level: 1,
        }
    }

    fn snapshot(state: &TargetState) -> SpawnSnapshot {
        SpawnSnapshot::capture(state, 0, None)
    }

    /// Floor at y = 63 with a thick three-high square wall around the origin
    fn walled_terrain() -> Terrain {
        let mut terrain = Terrain::default();
        terrain.fill((-40, 63, -40), (40, 63, 40), BlockKind::Solid);
        for x in -5i32..=5 {
            for z in -5i32..=5 {
                if x.abs().max(z.abs()) >= 3 {
                    terrain.fill((x, 64, z), (x, 66, z), BlockKind::Solid);
                }
            }
        }
        terrain
    }

    fn open_terrain() -> Terrain {
        let mut terrain = Terrain::default();
        terrain.fill((-40, 63, -40), (40, 63, 40), BlockKind::Solid);
        terrain
    }

    #[test]
    fn test_level_from_team_average() {
        let planner = planner(SpawnConfig::default());
        let mut s = state("arena");
        s.team_average_level = 10.0;
        assert_eq!(planner.enemy_level(&snapshot(&s)), 10);
    }

    #[test]
    fn test_level_counts_allies_and_time() {
        let planner = planner(SpawnConfig::default());
        let mut s = state("arena");
        s.team_average_level = 10.0;
        s.nearby_allies = 5; // +1.0
        s.elapsed_seconds = 185; // 3 steps
        assert_eq!(planner.enemy_level(&snapshot(&s)), 14);
    }

    #[test]
    fn test_level_clamps_to_context_floor() {
        let planner = planner(SpawnConfig::default());
        let mut s = state("arena");
        s.team_average_level = 1.0;
        s.min_enemy_level = 8;
        assert_eq!(planner.enemy_level(&snapshot(&s)), 8);
    }

    #[test]
    fn test_level_clamps_to_ceiling_after_escalation() {
        let planner = planner(SpawnConfig {
            max_enemy_level: 15,
            ..SpawnConfig::default()
        });
        let mut s = state("arena");
        s.level = 10;
        s.team_average_level = 10.0;
        s.min_enemy_level = 8;
        s.elapsed_seconds = 60 * 30;
        assert_eq!(planner.enemy_level(&snapshot(&s)), 15);
    }

    #[test]
    fn test_floor_above_ceiling_collapses_to_ceiling() {
        let planner = planner(SpawnConfig {
            max_enemy_level: 15,
            ..SpawnConfig::default()
        });
        let mut s = state("arena");
        s.min_enemy_level = 40;
        assert_eq!(planner.enemy_level(&snapshot(&s)), 15);
    }

    #[test]
    fn test_time_scaling_disabled() {
        let planner = planner(SpawnConfig {
            time_scaling: false,
            ..SpawnConfig::default()
        });
        let mut s = state("arena");
        s.team_average_level = 5.0;
        s.elapsed_seconds = 6000;
        assert_eq!(planner.enemy_level(&snapshot(&s)), 5);
    }

    #[test]
    fn test_region_at_cap_yields_nothing() {
        let planner = planner(SpawnConfig {
            max_active_per_region: 5,
            ..SpawnConfig::default()
        });
        let snap = SpawnSnapshot::capture(&state("arena"), 5, None);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let decision = planner.plan_target(&snap, &[], Instant::now(), &mut rng).unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn test_saturated_surroundings_yield_nothing() {
        let planner = planner(SpawnConfig::default());
        let mut s = state("arena");
        s.nearby_hostiles = 10; // desired at level 3 is 11
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(planner
            .plan_target(&snapshot(&s), &[], Instant::now(), &mut rng)
            .unwrap()
            .is_some());

        s.nearby_hostiles = 11;
        assert!(planner
            .plan_target(&snapshot(&s), &[], Instant::now(), &mut rng)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_no_qualifying_archetype_yields_nothing() {
        let planner = SpawnPlanner::new(
            SpawnConfig::default(),
            ArchetypeCatalog::new(vec![ArchetypeDef::new("boss", 1.0, 50..=60)]).unwrap(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let decision = planner
            .plan_target(&snapshot(&state("arena")), &[], Instant::now(), &mut rng)
            .unwrap();
        assert!(decision.is_none());
    }

    /// Source that answers every lookup with one fixed archetype and records the ranges asked
    struct FixedSource {
        archetype: Arc<ArchetypeDef>,
        asked: std::sync::Mutex<Vec<RangeInclusive<u32>>>,
    }

    impl ArchetypeSource for Arc<FixedSource> {
        fn archetypes_for(&self, levels: RangeInclusive<u32>) -> Vec<Arc<ArchetypeDef>> {
            self.asked.lock().unwrap().push(levels);
            vec![Arc::clone(&self.archetype)]
        }
    }

    #[test]
    fn test_archetypes_come_from_source() {
        let source = Arc::new(FixedSource {
            archetype: Arc::new(ArchetypeDef::new("ghoul", 1.0, 1..=100)),
            asked: std::sync::Mutex::new(Vec::new()),
        });
        let planner = SpawnPlanner::new(SpawnConfig::default(), Arc::clone(&source));
        let mut s = state("arena");
        s.team_average_level = 7.0;
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let decision = planner
            .plan_target(&snapshot(&s), &[], Instant::now(), &mut rng)
            .unwrap()
            .unwrap();

        assert_eq!(decision.archetype().id, "ghoul");
        assert_eq!(*source.asked.lock().unwrap(), vec![7..=7]);
    }

    #[test]
    fn test_non_finite_input_is_a_planning_error() {
        let planner = planner(SpawnConfig::default());
        let mut s = state("arena");
        s.position.x = f32::NAN;
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = planner.plan_target(&snapshot(&s), &[], Instant::now(), &mut rng);
        assert!(matches!(result, Err(SpawnError::Planning(_))));
    }

    #[test]
    fn test_failing_target_does_not_affect_batch() {
        let planner = planner(SpawnConfig::default());
        let mut broken = state("arena");
        broken.position.z = f32::INFINITY;
        let healthy = state("arena");

        let batch = PlanBatch::new(vec![snapshot(&broken), snapshot(&healthy)], 9);
        let decisions = planner.plan(&batch);

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].target(), healthy.target);
    }

    #[test]
    fn test_destinations_stay_in_annulus() {
        let planner = planner(SpawnConfig::default());
        let s = state("arena");
        let snap = snapshot(&s);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..500 {
            let decision = planner
                .plan_target(&snap, &[], Instant::now(), &mut rng)
                .unwrap()
                .unwrap();
            let d = decision.destination() - s.position;
            let horizontal = (d.x * d.x + d.z * d.z).sqrt();
            assert!((7.99..=25.01).contains(&horizontal), "distance {horizontal}");
            assert!((1..=100).contains(&decision.level()));
        }
    }

    #[test]
    fn test_archetype_constraints_narrow_distance() {
        let planner = SpawnPlanner::new(
            SpawnConfig::default(),
            ArchetypeCatalog::new(vec![ArchetypeDef::new("sniper", 1.0, 1..=100)
                .with_constraints(SpawnConstraints {
                    min_distance: Some(20.0),
                    max_distance: None,
                })])
            .unwrap(),
        );
        let s = state("arena");
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            let decision = planner
                .plan_target(&snapshot(&s), &[], Instant::now(), &mut rng)
                .unwrap()
                .unwrap();
            let d = decision.destination() - s.position;
            assert!((d.x * d.x + d.z * d.z).sqrt() >= 19.99);
        }
    }

    #[test]
    fn test_visible_candidates_rejected_in_open_field() {
        let planner = planner(SpawnConfig::default());
        let s = state("arena");
        let terrain = open_terrain().capture(s.position, 25.0);
        let snap = SpawnSnapshot::capture(&s, 0, Some(terrain));
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let decision = planner.plan_target(&snap, &[], Instant::now(), &mut rng).unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn test_hidden_candidates_accepted_behind_wall() {
        let planner = planner(SpawnConfig::default());
        let s = state("arena");
        let terrain = walled_terrain().capture(s.position, 25.0);
        let snap = SpawnSnapshot::capture(&s, 0, Some(terrain));
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..50 {
            let decision = planner
                .plan_target(&snap, &[], Instant::now(), &mut rng)
                .unwrap()
                .expect("walled arena hides every candidate");
            assert!(!snap.is_visible_from(decision.destination()));
            assert_eq!(decision.destination().y, 64.0);
        }
    }

    #[test]
    fn test_suppression_zone_covering_annulus_blocks_spawn() {
        let planner = planner(SpawnConfig::default());
        let s = state("arena");
        let now = Instant::now();
        let zone = SuppressionZone {
            run: None,
            region: s.region.clone(),
            center: s.position,
            radius: 30.0,
            expires_at: now + Duration::from_secs(60),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let decision = planner.plan_target(&snapshot(&s), &[zone], now, &mut rng).unwrap();
        assert!(decision.is_none());
    }

    #[test]
    fn test_seeded_batches_are_reproducible_and_parallel_safe() {
        let states: Vec<_> = (0..40)
            .map(|i| state(if i % 2 == 0 { "north" } else { "south" }))
            .collect();
        let batch = PlanBatch::new(states.iter().map(snapshot).collect(), 42);

        let sequential = planner(SpawnConfig {
            parallel_threshold: usize::MAX,
            ..SpawnConfig::default()
        })
        .plan(&batch);
        let parallel = planner(SpawnConfig {
            parallel_threshold: 1,
            ..SpawnConfig::default()
        })
        .plan(&batch);

        assert_eq!(sequential.len(), 40);
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.target(), b.target());
            assert_eq!(a.destination(), b.destination());
            assert_eq!(a.archetype().id, b.archetype().id);
        }
    }

    #[test]
    fn test_interleave_by_region_round_robin() {
        let north: Vec<_> = (0..3).map(|_| state("north")).collect();
        let south = state("south");
        let archetype = Arc::new(ArchetypeDef::new("zombie", 1.0, 1..=10));
        let decision = |s: &TargetState| {
            SpawnDecision::new(&snapshot(s), s.position, archetype.clone(), 1)
        };

        let input = vec![
            decision(&north[0]),
            decision(&north[1]),
            decision(&north[2]),
            decision(&south),
        ];
        let regions: Vec<_> = interleave_by_region(input)
            .iter()
            .map(|d| d.region().to_string())
            .collect();
        assert_eq!(regions, vec!["north", "south", "north", "north"]);
    }
}
