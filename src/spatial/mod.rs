//! Spatial queries: nearby counts and terrain occlusion

pub mod sparse_hash;
pub mod terrain;

pub use sparse_hash::SparseHashGrid;
pub use terrain::{BlockKind, Terrain, TerrainSnapshot};
