//! Errors surfaced by the generation loop.

use crate::compute::NetworkError;
use crate::history::HistoryFormatError;
use crate::schema::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Snapshot holds {found} agents, population holds {expected}")]
    SnapshotSize { expected: usize, found: usize },
    #[error("Snapshot agent {index} has an incompatible brain: {source}")]
    SnapshotBrain {
        index: usize,
        #[source]
        source: NetworkError,
    },
    #[error("No recorded generation at run {run}, index {index}")]
    UnknownGeneration { run: usize, index: usize },
    #[error("A batch run currently owns the simulation")]
    BatchActive,
    #[error("History persistence failed: {0}")]
    History(#[from] HistoryFormatError),
}
