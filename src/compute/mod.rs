//! Compute module - Brains, agents, the obstacle course and the evolution loop.

mod agent;
mod network;
pub mod world;

pub mod evolution;

pub use agent::*;
pub use network::*;
pub use world::{Obstacle, World, alive_count, all_terminated};
