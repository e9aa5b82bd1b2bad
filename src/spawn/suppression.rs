//! Temporary spawn suppression
//!
//! Gives players a safe window (e.g. after completing an objective) either
//! per target or inside a circular zone. Entries expire on their own and
//! are purged at the start of every cycle.

use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::core::types::{Position, RegionKey, RunId, TargetId};

#[derive(Debug, Clone, Copy)]
struct TargetSuppression {
    run: RunId,
    expires_at: Instant,
}

/// Circular no-spawn area on the horizontal plane
#[derive(Debug, Clone)]
pub struct SuppressionZone {
    /// None applies to every run in the region
    pub run: Option<RunId>,
    pub region: RegionKey,
    pub center: Position,
    pub radius: f32,
    pub expires_at: Instant,
}

impl SuppressionZone {
    pub fn covers(&self, run: RunId, region: &RegionKey, pos: Position, now: Instant) -> bool {
        if self.expires_at <= now {
            return false;
        }
        if self.run.is_some_and(|zone_run| zone_run != run) {
            return false;
        }
        if !self.region.matches_ignore_case(region.as_str()) {
            return false;
        }
        let dx = pos.x - self.center.x;
        let dz = pos.z - self.center.z;
        dx * dx + dz * dz <= self.radius * self.radius
    }
}

#[derive(Debug, Default)]
pub struct SuppressionState {
    targets: AHashMap<TargetId, TargetSuppression>,
    zones: Vec<SuppressionZone>,
}

impl SuppressionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress spawning around `targets` while they play `run`
    ///
    /// A longer existing window for the same run is kept; a window from
    /// another run is replaced.
    pub fn suppress_targets(
        &mut self,
        run: RunId,
        targets: &[TargetId],
        duration: Duration,
        now: Instant,
    ) {
        if duration.is_zero() {
            return;
        }
        let expires_at = now + duration;
        for &target in targets {
            self.targets
                .entry(target)
                .and_modify(|existing| {
                    if existing.run != run || existing.expires_at < expires_at {
                        *existing = TargetSuppression { run, expires_at };
                    }
                })
                .or_insert(TargetSuppression { run, expires_at });
        }
    }

    pub fn add_zone(
        &mut self,
        run: Option<RunId>,
        region: RegionKey,
        center: Position,
        radius: f32,
        duration: Duration,
        now: Instant,
    ) {
        if duration.is_zero() || radius.is_nan() || radius <= 0.0 {
            return;
        }
        self.zones.push(SuppressionZone {
            run,
            region,
            center,
            radius,
            expires_at: now + duration,
        });
    }

    /// Drop every entry belonging to `run`
    pub fn clear_run(&mut self, run: RunId) {
        self.targets.retain(|_, s| s.run != run);
        self.zones.retain(|zone| zone.run != Some(run));
    }

    pub fn purge_expired(&mut self, now: Instant) {
        self.targets.retain(|_, s| s.expires_at > now);
        self.zones.retain(|zone| zone.expires_at > now);
    }

    pub fn is_target_suppressed(&self, run: RunId, target: TargetId, now: Instant) -> bool {
        self.targets
            .get(&target)
            .is_some_and(|s| s.run == run && s.expires_at > now)
    }

    pub fn is_location_suppressed(
        &self,
        run: RunId,
        region: &RegionKey,
        pos: Position,
        now: Instant,
    ) -> bool {
        self.zones.iter().any(|zone| zone.covers(run, region, pos, now))
    }

    /// Owned copy of the zones still active at `now`, for the plan phase
    pub fn active_zones(&self, now: Instant) -> Vec<SuppressionZone> {
        self.zones
            .iter()
            .filter(|zone| zone.expires_at > now)
            .cloned()
            .collect()
    }
}
