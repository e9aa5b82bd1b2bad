//! Survivor Spawn - off-thread enemy spawn planning for survival arenas

pub mod core;
pub mod sandbox;
pub mod spatial;
pub mod spawn;
