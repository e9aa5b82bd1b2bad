pub mod config;
pub mod error;
pub mod types;

pub use config::SpawnConfig;
pub use error::{Result, SpawnError};
