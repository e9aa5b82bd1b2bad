//! Spawn orchestrator - drives collect -> plan -> apply
//!
//! Collect and apply run on the simulation thread with exclusive access to
//! the host. Planning runs either inline or on a tokio blocking thread and
//! hands back owned decisions through a oneshot channel that `poll` drains
//! without ever blocking.
//!
//! The plan phase works from a possibly stale view, so every decision is
//! re-validated against live state before it touches the world. The region
//! cap in particular is only authoritative here.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::core::config::SpawnConfig;
use crate::core::error::{Result, SpawnError};
use crate::core::types::{is_addressable, EntityHandle, Position, RegionKey, RunId, TargetId};
use crate::spawn::archetype::ArchetypeCatalog;
use crate::spawn::host::{SpawnHost, SpawnRequest};
use crate::spawn::planner::{PlanBatch, SpawnPlanner};
use crate::spawn::region::{RegionRegistry, RegionStatus};
use crate::spawn::snapshot::{SpawnDecision, SpawnSnapshot};
use crate::spawn::suppression::SuppressionState;

/// Where the plan phase runs
#[derive(Debug, Clone)]
pub enum PlanDispatch {
    /// On the calling thread; results are applied by the next poll
    Inline,
    /// On the runtime's blocking pool
    Runtime(Handle),
}

/// Counts from one `run_cycle` or `poll` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Snapshots handed to the plan phase
    pub collected: usize,
    /// Enemies created in the world
    pub realized: usize,
    /// Decisions dropped by apply-time re-validation
    pub discarded: usize,
    /// Decisions the world refused to realize
    pub failed: usize,
}

impl CycleReport {
    pub fn absorb(&mut self, other: CycleReport) {
        self.collected += other.collected;
        self.realized += other.realized;
        self.discarded += other.discarded;
        self.failed += other.failed;
    }
}

enum InFlight {
    Ready(Vec<SpawnDecision>),
    Pending(oneshot::Receiver<Vec<SpawnDecision>>),
}

enum ApplyOutcome {
    Realized(EntityHandle),
    Discarded(&'static str),
    Failed,
}

pub struct SpawnOrchestrator {
    planner: Arc<SpawnPlanner>,
    dispatch: PlanDispatch,
    regions: Arc<RegionRegistry>,
    suppression: SuppressionState,
    active: Arc<AtomicBool>,
    in_flight: Option<InFlight>,
    pending: VecDeque<SpawnDecision>,
    rng: ChaCha8Rng,
}

impl SpawnOrchestrator {
    /// Validate configuration and build an active orchestrator
    pub fn new(
        config: SpawnConfig,
        catalog: ArchetypeCatalog,
        dispatch: PlanDispatch,
    ) -> Result<Self> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(SpawnError::Config("no enemy archetypes configured".into()));
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        tracing::info!(
            "Spawn orchestrator ready: {} archetypes, cap {} per region",
            catalog.len(),
            config.max_active_per_region
        );

        Ok(Self {
            planner: Arc::new(SpawnPlanner::new(config, catalog)),
            dispatch,
            regions: Arc::new(RegionRegistry::new()),
            suppression: SuppressionState::new(),
            active: Arc::new(AtomicBool::new(true)),
            in_flight: None,
            pending: VecDeque::new(),
            rng,
        })
    }

    pub fn config(&self) -> &SpawnConfig {
        self.planner.config()
    }

    pub fn regions(&self) -> &Arc<RegionRegistry> {
        &self.regions
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// A plan is running or its results have not been drained yet
    pub fn has_plan_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Decisions waiting for a later poll because of the per-tick limit
    pub fn pending_decisions(&self) -> usize {
        self.pending.len()
    }

    /// One spawn cycle: drain finished work, then collect and dispatch
    ///
    /// A new batch is only collected once the previous one is fully
    /// applied, so at most one plan is ever outstanding.
    pub fn run_cycle<H: SpawnHost + ?Sized>(&mut self, host: &mut H) -> CycleReport {
        if !self.config().enabled || !self.is_active() {
            return CycleReport::default();
        }

        let now = Instant::now();
        self.suppression.purge_expired(now);

        let mut report = self.poll(host);
        if self.in_flight.is_some() || !self.pending.is_empty() {
            tracing::debug!(
                "Skipping collection: plan in flight or {} decisions pending",
                self.pending.len()
            );
            return report;
        }

        let snapshots = self.collect(host, now);
        report.collected = snapshots.len();
        if snapshots.is_empty() {
            return report;
        }

        let batch = PlanBatch {
            snapshots,
            zones: self.suppression.active_zones(now),
            captured_at: now,
            seed: self.rng.gen(),
        };
        self.dispatch_plan(batch);

        report
    }

    /// Apply finished decisions, up to `max_spawns_per_tick` realization attempts
    ///
    /// Stale decisions are discarded without using the budget. Never
    /// blocks; leftover decisions stay queued for the next poll.
    pub fn poll<H: SpawnHost + ?Sized>(&mut self, host: &mut H) -> CycleReport {
        let mut report = CycleReport::default();
        if !self.is_active() {
            return report;
        }

        self.drain_in_flight();

        let now = Instant::now();
        let budget = self.config().max_spawns_per_tick;
        let mut attempts = 0;
        while attempts < budget {
            let Some(decision) = self.pending.pop_front() else {
                break;
            };
            let outcome = self.apply(&decision, host, now);
            if !matches!(outcome, ApplyOutcome::Discarded(_)) {
                attempts += 1;
            }
            match outcome {
                ApplyOutcome::Realized(handle) => {
                    tracing::debug!(
                        "Spawned {} (level {}) as {:?} in {}",
                        decision.archetype().id,
                        decision.level(),
                        handle,
                        decision.region()
                    );
                    report.realized += 1;
                }
                ApplyOutcome::Discarded(reason) => {
                    tracing::debug!(
                        "Discarded spawn for target {:?}: {}",
                        decision.target(),
                        reason
                    );
                    report.discarded += 1;
                }
                ApplyOutcome::Failed => report.failed += 1,
            }
        }

        report
    }

    /// Poll repeatedly until no plan is in flight and nothing is pending
    ///
    /// Intended for tests and tools; sleeps between empty polls.
    pub fn drain<H: SpawnHost + ?Sized>(&mut self, host: &mut H, timeout: Duration) -> CycleReport {
        let deadline = Instant::now() + timeout;
        let mut report = CycleReport::default();
        while self.is_active() && (self.in_flight.is_some() || !self.pending.is_empty()) {
            report.absorb(self.poll(host));
            if Instant::now() >= deadline {
                tracing::warn!("Spawn drain timed out with work outstanding");
                break;
            }
            if matches!(self.in_flight, Some(InFlight::Pending(_))) {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        report
    }

    /// Stop all work; results that arrive later are dropped
    pub fn shutdown(&mut self) {
        self.active.store(false, Ordering::Release);
        let dropped = self.pending.len();
        self.pending.clear();
        self.in_flight = None;
        tracing::info!("Spawn orchestrator shut down, {} pending decisions dropped", dropped);
    }

    fn collect<H: SpawnHost + ?Sized>(&self, host: &H, now: Instant) -> Vec<SpawnSnapshot> {
        let config = self.config();
        let mut snapshots = Vec::new();

        for region in host.regions() {
            let state = self.regions.get_or_create(&region);
            if state.is_paused() {
                continue;
            }
            let active_count = state.active_count();
            if active_count >= config.max_active_per_region {
                tracing::debug!("Region {} at cap ({}), not collecting", region, active_count);
                continue;
            }

            for target in host.list_eligible_targets(&region) {
                let Some(target_state) = host.target_state(target) else {
                    continue;
                };
                if !is_addressable(target_state.position) {
                    tracing::warn!(
                        "Skipping target {:?} at unaddressable position {}",
                        target,
                        target_state.position
                    );
                    continue;
                }
                if self
                    .suppression
                    .is_target_suppressed(target_state.run, target, now)
                {
                    continue;
                }

                let terrain = if config.line_of_sight_checks {
                    host.capture_terrain(
                        &target_state.region,
                        target_state.position,
                        config.max_spawn_distance,
                    )
                } else {
                    None
                };

                snapshots.push(SpawnSnapshot::capture(&target_state, active_count, terrain));
            }
        }

        snapshots
    }

    fn dispatch_plan(&mut self, batch: PlanBatch) {
        tracing::debug!("Dispatching spawn plan for {} targets", batch.len());

        match &self.dispatch {
            PlanDispatch::Inline => {
                let decisions = self.planner.plan(&batch);
                self.in_flight = Some(InFlight::Ready(decisions));
            }
            PlanDispatch::Runtime(handle) => {
                let (tx, rx) = oneshot::channel();
                let planner = Arc::clone(&self.planner);
                let active = Arc::clone(&self.active);
                handle.spawn_blocking(move || {
                    if !active.load(Ordering::Acquire) {
                        return;
                    }
                    // Receiver gone means the orchestrator shut down
                    let _ = tx.send(planner.plan(&batch));
                });
                self.in_flight = Some(InFlight::Pending(rx));
            }
        }
    }

    fn drain_in_flight(&mut self) {
        match self.in_flight.take() {
            Some(InFlight::Ready(decisions)) => self.pending.extend(decisions),
            Some(InFlight::Pending(mut rx)) => match rx.try_recv() {
                Ok(decisions) => self.pending.extend(decisions),
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.in_flight = Some(InFlight::Pending(rx));
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    tracing::warn!("Spawn plan task ended without a result");
                }
            },
            None => {}
        }
    }

    fn apply<H: SpawnHost + ?Sized>(
        &self,
        decision: &SpawnDecision,
        host: &mut H,
        now: Instant,
    ) -> ApplyOutcome {
        let config = self.config();

        let Some(state) = host.target_state(decision.target()) else {
            return ApplyOutcome::Discarded("target no longer eligible");
        };
        if state.run != decision.run() {
            return ApplyOutcome::Discarded("target changed run");
        }
        if state.region != *decision.region() {
            return ApplyOutcome::Discarded("target changed region");
        }
        if state.position.distance(decision.destination()) > config.max_spawn_distance * 2.0 {
            return ApplyOutcome::Discarded("target moved too far");
        }
        if self
            .suppression
            .is_target_suppressed(decision.run(), decision.target(), now)
            || self.suppression.is_location_suppressed(
                decision.run(),
                decision.region(),
                decision.destination(),
                now,
            )
        {
            return ApplyOutcome::Discarded("suppressed");
        }

        let region = self.regions.get_or_create(decision.region());
        if region.is_paused() {
            return ApplyOutcome::Discarded("region paused");
        }
        if region.active_count() >= config.max_active_per_region {
            return ApplyOutcome::Discarded("region at cap");
        }

        let request = SpawnRequest {
            region: decision.region().clone(),
            run: decision.run(),
            target: decision.target(),
            position: decision.destination(),
            archetype: Arc::clone(decision.archetype()),
            level: decision.level(),
        };

        match host.spawn_entity(&request) {
            Ok(handle) => {
                region.increment();
                let counter = Arc::clone(&region);
                host.on_entity_removed(
                    handle,
                    Box::new(move |_| {
                        counter.decrement();
                    }),
                );
                ApplyOutcome::Realized(handle)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to realize {} in {}: {}",
                    decision.archetype().id,
                    decision.region(),
                    e
                );
                ApplyOutcome::Failed
            }
        }
    }

    // === ADMINISTRATION ===

    pub fn pause(&self, region: &RegionKey) {
        self.regions.get_or_create(region).set_paused(true);
        tracing::info!("Spawning paused in {}", region);
    }

    pub fn resume(&self, region: &RegionKey) {
        self.regions.get_or_create(region).set_paused(false);
        tracing::info!("Spawning resumed in {}", region);
    }

    pub fn is_paused(&self, region: &RegionKey) -> bool {
        self.regions.get(region).is_some_and(|state| state.is_paused())
    }

    pub fn active_count(&self, region: &RegionKey) -> u32 {
        self.regions.get(region).map_or(0, |state| state.active_count())
    }

    /// Overwrite a region's count, e.g. after a bulk cleanup
    pub fn set_active_count(&self, region: &RegionKey, count: u32) {
        self.regions.get_or_create(region).set_active_count(count);
    }

    pub fn region_status(&self) -> Vec<RegionStatus> {
        self.regions.statuses()
    }

    pub fn suppress_targets_for_run(&mut self, run: RunId, targets: &[TargetId], duration: Duration) {
        self.suppression
            .suppress_targets(run, targets, duration, Instant::now());
    }

    pub fn add_suppression_zone(
        &mut self,
        run: RunId,
        region: RegionKey,
        center: Position,
        radius: f32,
        duration: Duration,
    ) {
        self.suppression
            .add_zone(Some(run), region, center, radius, duration, Instant::now());
    }

    /// Zone that applies to every run in `region`
    pub fn add_global_suppression_zone(
        &mut self,
        region: RegionKey,
        center: Position,
        radius: f32,
        duration: Duration,
    ) {
        self.suppression
            .add_zone(None, region, center, radius, duration, Instant::now());
    }

    pub fn clear_suppression_for_run(&mut self, run: RunId) {
        self.suppression.clear_run(run);
    }
}
