//! Load spawn settings from TOML files

use std::fs;
use std::path::Path;

use crate::core::config::SpawnConfig;
use crate::core::error::Result;
use crate::spawn::archetype::ArchetypeCatalog;

/// Settings shipped with the crate
pub const DEFAULT_SETTINGS: &str = include_str!("../../config/spawning.toml");

/// Validated configuration plus archetype catalog
#[derive(Debug, Clone)]
pub struct SpawnSettings {
    pub config: SpawnConfig,
    pub catalog: ArchetypeCatalog,
}

/// Parse a document holding a `[spawning]` table and `[[archetypes]]` entries
pub fn parse_settings(content: &str) -> Result<SpawnSettings> {
    let config = SpawnConfig::from_toml_str(content)?;
    let catalog = ArchetypeCatalog::from_toml_str(content)?;
    Ok(SpawnSettings { config, catalog })
}

pub fn load_settings(path: &Path) -> Result<SpawnSettings> {
    let content = fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;
    tracing::info!(
        "Loaded spawn settings from {}: {} archetypes",
        path.display(),
        settings.catalog.len()
    );
    Ok(settings)
}

pub fn default_settings() -> Result<SpawnSettings> {
    parse_settings(DEFAULT_SETTINGS)
}
