//! Progress and result types published to observers of an evolution run.

use serde::{Deserialize, Serialize};

/// Summary of one completed generation, captured right before turnover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number that just finished (1-based).
    pub generation: usize,
    /// Highest fitness reached by any agent this generation.
    pub best_fitness: f32,
    /// Mean fitness across the whole population.
    pub average_fitness: f32,
    /// Best fitness ever observed by the population, including this generation.
    pub best_fitness_ever: f32,
    /// Agents still alive when the generation ended (non-zero only when the tick bound hit).
    pub alive_count: usize,
    /// Obstacles cleared during the generation.
    pub score: u64,
    /// World ticks the generation lasted.
    pub ticks: u64,
    /// Seed the obstacle layout was generated from.
    pub world_seed: u64,
}

/// Immutable scalar snapshot for display while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Generation currently being evaluated.
    pub generation: usize,
    /// World tick within the current generation.
    pub tick: u64,
    /// Agents alive right now.
    pub alive_count: usize,
    /// Population size.
    pub population_size: usize,
    /// Highest fitness among the live population right now.
    pub current_fitness: f32,
    /// Mean fitness of the live population right now.
    pub average_fitness: f32,
    /// Best fitness ever observed.
    pub best_fitness: f32,
    /// Obstacles cleared in the current generation.
    pub score: u64,
    /// Whether a batch worker currently owns the simulation.
    pub running: bool,
}

/// Per-generation fitness series for charting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessHistory {
    /// Best fitness per completed generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per completed generation.
    pub average_fitness: Vec<f32>,
}

impl FitnessHistory {
    /// Append one completed generation.
    pub fn push(&mut self, stats: &GenerationStats) {
        self.best_fitness.push(stats.best_fitness);
        self.average_fitness.push(stats.average_fitness);
    }

    /// Number of generations recorded.
    pub fn len(&self) -> usize {
        self.best_fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_fitness.is_empty()
    }

    pub fn clear(&mut self) {
        self.best_fitness.clear();
        self.average_fitness.clear();
    }
}

/// Result of a single interactive step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// At least one agent is still alive.
    Running,
    /// Every agent died on this tick and the population has been evolved.
    GenerationCompleted(GenerationStats),
}

/// Reason a batch run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Requested number of generations completed.
    Completed,
    /// Cancel flag observed at a tick or generation boundary.
    Cancelled,
}

/// Statistics from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Generations that completed turnover during the batch.
    pub generations: usize,
    /// Total world ticks simulated.
    pub total_ticks: u64,
    /// Generations ended by the tick bound rather than by extinction.
    pub tick_bound_hits: usize,
    /// Best fitness ever observed at the end of the batch.
    pub best_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}
