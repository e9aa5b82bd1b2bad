//! Core type definitions used throughout the codebase

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// World-space position (y is up)
pub type Position = glam::Vec3;

/// Simulation tick counter
pub type Tick = u64;

/// Identifier of a spawn target (typically a player)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub Uuid);

impl TargetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of the run (activity session) a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an entity realized in the live world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

/// Key of a region (one world or zone) with its own cap and pause flag
///
/// Cheap to clone; snapshots and decisions carry their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(Arc<str>);

impl RegionKey {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive name comparison, used by archetype allow-lists
    pub fn matches_ignore_case(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

impl From<&str> for RegionKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest absolute block coordinate a position may have
pub const WORLD_BORDER: f32 = 30_000_000.0;

/// Returns true if a position is finite and inside the world border
pub fn is_addressable(pos: Position) -> bool {
    pos.is_finite() && pos.abs().max_element() <= WORLD_BORDER
}

/// Integer block coordinate containing a position
#[inline]
pub fn block_of(pos: Position) -> (i32, i32, i32) {
    (
        pos.x.floor() as i32,
        pos.y.floor() as i32,
        pos.z.floor() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_key_equality() {
        let a = RegionKey::new("arena_1");
        let b = RegionKey::from("arena_1");
        let c = RegionKey::new("arena_2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_region_key_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<RegionKey, u32> = HashMap::new();
        map.insert(RegionKey::new("arena_1"), 5);
        assert_eq!(map.get(&RegionKey::new("arena_1")), Some(&5));
    }

    #[test]
    fn test_region_key_case_insensitive_match() {
        let key = RegionKey::new("Arena_North");
        assert!(key.matches_ignore_case("arena_north"));
        assert!(!key.matches_ignore_case("arena_south"));
    }

    #[test]
    fn test_block_of_negative_coordinates() {
        assert_eq!(block_of(Position::new(-0.5, 64.2, 3.9)), (-1, 64, 3));
    }

    #[test]
    fn test_addressable_positions() {
        assert!(is_addressable(Position::new(-29_999_999.0, 64.0, 12.0)));
        assert!(!is_addressable(Position::new(3.0e9, 64.0, 0.0)));
        assert!(!is_addressable(Position::new(0.0, f32::INFINITY, 0.0)));
        assert!(!is_addressable(Position::new(f32::NAN, 64.0, 0.0)));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TargetId::new(), TargetId::new());
        assert_ne!(RunId::new(), RunId::new());
    }
}
