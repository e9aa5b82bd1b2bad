use thiserror::Error;

use crate::core::types::{EntityHandle, Position, RegionKey, TargetId};

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Chunk not loaded in {region} at {position}")]
    ChunkNotLoaded { region: RegionKey, position: Position },

    #[error("Could not realize entity: {0}")]
    Realization(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(RegionKey),

    #[error("Unknown target: {0:?}")]
    UnknownTarget(TargetId),

    #[error("Unknown entity: {0:?}")]
    UnknownEntity(EntityHandle),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SpawnError>;
