//! Schema module - Configuration and statistics types for evolution sessions.

mod config;
mod stats;

pub use config::*;
pub use stats::*;
