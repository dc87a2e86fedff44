//! History module - Recorded generations and their persistence.

mod format;
mod store;

pub use format::*;
pub use store::*;
