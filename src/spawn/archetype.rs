//! Enemy archetype definitions and the catalog they are chosen from

use std::ops::RangeInclusive;
use std::sync::Arc;

use ahash::AHashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SpawnError};
use crate::core::types::RegionKey;
use crate::spawn::host::ArchetypeSource;

/// Region allow-list entry meaning "every region"
pub const ANY_REGION: &str = "any";

/// Named enemy template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeDef {
    pub id: String,
    /// Entity type handed to the world when realizing the spawn
    #[serde(default = "default_enemy_type")]
    pub enemy_type: String,
    /// Relative selection weight among eligible archetypes
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    /// Unbounded when absent
    #[serde(default)]
    pub max_level: Option<u32>,
    /// Empty, or containing "any", admits every region (case-insensitive)
    #[serde(default)]
    pub allowed_regions: Vec<String>,
    #[serde(default)]
    pub spawn: SpawnConstraints,
}

/// Optional per-archetype narrowing of the spawn annulus
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnConstraints {
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
}

impl SpawnConstraints {
    /// Intersect with the global annulus; None when the result is empty
    pub fn narrow(&self, min: f32, max: f32) -> Option<(f32, f32)> {
        let lo = self.min_distance.map_or(min, |d| d.max(min));
        let hi = self.max_distance.map_or(max, |d| d.min(max));
        (lo < hi).then_some((lo, hi))
    }
}

fn default_enemy_type() -> String {
    "zombie".to_string()
}

fn default_weight() -> f64 {
    1.0
}

fn default_min_level() -> u32 {
    1
}

impl ArchetypeDef {
    pub fn new(id: &str, weight: f64, levels: RangeInclusive<u32>) -> Self {
        Self {
            id: id.to_string(),
            enemy_type: default_enemy_type(),
            weight,
            min_level: *levels.start(),
            max_level: Some(*levels.end()),
            allowed_regions: Vec::new(),
            spawn: SpawnConstraints::default(),
        }
    }

    pub fn with_regions(mut self, regions: &[&str]) -> Self {
        self.allowed_regions = regions.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_constraints(mut self, spawn: SpawnConstraints) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn level_range(&self) -> RangeInclusive<u32> {
        self.min_level..=self.max_level.unwrap_or(u32::MAX)
    }

    pub fn accepts_level(&self, level: u32) -> bool {
        self.level_range().contains(&level)
    }

    pub fn is_allowed_in(&self, region: &RegionKey) -> bool {
        self.allowed_regions.is_empty()
            || self
                .allowed_regions
                .iter()
                .any(|r| r.eq_ignore_ascii_case(ANY_REGION) || region.matches_ignore_case(r))
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SpawnError::Config("archetype with empty id".into()));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(SpawnError::Config(format!(
                "archetype '{}': weight must be positive, got {}",
                self.id, self.weight
            )));
        }
        if let Some(max) = self.max_level {
            if max < self.min_level {
                return Err(SpawnError::Config(format!(
                    "archetype '{}': max_level {} below min_level {}",
                    self.id, max, self.min_level
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.spawn.min_distance, self.spawn.max_distance) {
            if lo >= hi {
                return Err(SpawnError::Config(format!(
                    "archetype '{}': spawn.min_distance {} should be < spawn.max_distance {}",
                    self.id, lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// Weighted random pick; None for an empty slice
pub fn choose_weighted<R: Rng + ?Sized>(
    candidates: &[Arc<ArchetypeDef>],
    rng: &mut R,
) -> Option<Arc<ArchetypeDef>> {
    candidates
        .choose_weighted(rng, |archetype| archetype.weight)
        .ok()
        .cloned()
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    archetypes: Vec<ArchetypeDef>,
}

/// Validated, immutable set of archetypes
#[derive(Debug, Clone)]
pub struct ArchetypeCatalog {
    archetypes: Vec<Arc<ArchetypeDef>>,
}

impl ArchetypeCatalog {
    /// Build a catalog, refusing empty or malformed definitions
    pub fn new(archetypes: Vec<ArchetypeDef>) -> Result<Self> {
        if archetypes.is_empty() {
            return Err(SpawnError::Config("no enemy archetypes configured".into()));
        }

        let mut seen = AHashSet::new();
        for archetype in &archetypes {
            archetype.validate()?;
            if !seen.insert(archetype.id.to_ascii_lowercase()) {
                return Err(SpawnError::Config(format!(
                    "duplicate archetype id '{}'",
                    archetype.id
                )));
            }
        }

        Ok(Self {
            archetypes: archetypes.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse `[[archetypes]]` entries from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::new(file.archetypes)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ArchetypeDef>> {
        self.archetypes.iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ArchetypeDef>> {
        self.archetypes.iter()
    }
}

impl ArchetypeSource for ArchetypeCatalog {
    fn archetypes_for(&self, levels: RangeInclusive<u32>) -> Vec<Arc<ArchetypeDef>> {
        self.archetypes
            .iter()
            .filter(|a| {
                let range = a.level_range();
                range.start() <= levels.end() && levels.start() <= range.end()
            })
            .cloned()
            .collect()
    }
}
