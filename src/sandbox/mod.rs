//! In-memory host world for demos and tests

pub mod world;

pub use world::{Mob, Player, SandboxWorld, TICKS_PER_SECOND};
