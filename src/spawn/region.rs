//! Per-region spawner state
//!
//! Counters are adjusted from the apply phase and from entity-removal
//! hooks, which may fire on any thread, so every field is atomic.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use serde::Serialize;

use crate::core::types::RegionKey;

/// Pause flag and active-entity count for one region
#[derive(Debug)]
pub struct RegionSpawnState {
    key: RegionKey,
    paused: AtomicBool,
    active_count: AtomicU32,
}

impl RegionSpawnState {
    pub fn new(key: RegionKey) -> Self {
        Self {
            key,
            paused: AtomicBool::new(false),
            active_count: AtomicU32::new(0),
        }
    }

    pub fn key(&self) -> &RegionKey {
        &self.key
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Only gates the apply phase; planning already in flight is unaffected
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn active_count(&self) -> u32 {
        self.active_count.load(Ordering::Acquire)
    }

    pub fn set_active_count(&self, count: u32) {
        self.active_count.store(count, Ordering::Release);
    }

    /// Returns the new count
    pub fn increment(&self) -> u32 {
        self.active_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the new count; saturates at zero
    pub fn decrement(&self) -> u32 {
        let previous = self
            .active_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn status(&self) -> RegionStatus {
        RegionStatus {
            region: self.key.to_string(),
            paused: self.is_paused(),
            active_count: self.active_count(),
        }
    }
}

/// Administrative view of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionStatus {
    pub region: String,
    pub paused: bool,
    pub active_count: u32,
}

/// Lazily populated map of region states
///
/// The lock only guards the map shape; states are handed out as `Arc`s
/// and mutated through their own atomics.
#[derive(Debug, Default)]
pub struct RegionRegistry {
    regions: RwLock<AHashMap<RegionKey, Arc<RegionSpawnState>>>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a region, created on first reference
    pub fn get_or_create(&self, key: &RegionKey) -> Arc<RegionSpawnState> {
        if let Some(state) = self.get(key) {
            return state;
        }
        let mut regions = self.regions.write().unwrap_or_else(|e| e.into_inner());
        regions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RegionSpawnState::new(key.clone())))
            .clone()
    }

    /// State for a region without creating it
    pub fn get(&self, key: &RegionKey) -> Option<Arc<RegionSpawnState>> {
        let regions = self.regions.read().unwrap_or_else(|e| e.into_inner());
        regions.get(key).cloned()
    }

    /// Status of every known region, sorted by key
    pub fn statuses(&self) -> Vec<RegionStatus> {
        let regions = self.regions.read().unwrap_or_else(|e| e.into_inner());
        let mut statuses: Vec<_> = regions.values().map(|state| state.status()).collect();
        statuses.sort_by(|a, b| a.region.cmp(&b.region));
        statuses
    }

    pub fn len(&self) -> usize {
        self.regions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
