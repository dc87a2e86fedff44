//! neuroflap - Neuroevolution of agents on a side-scrolling obstacle course.
//!
//! A population of small feed-forward networks controls agents that fall
//! under gravity and may jump. Agents that survive longer score higher, and
//! a generational genetic algorithm (elitism, roulette selection, uniform
//! crossover, Gaussian mutation) breeds the next population.
//!
//! # Architecture
//!
//! - `schema`: Configuration and progress/result types
//! - `compute`: Networks, agents, the world and the evolution loop
//! - `history`: Recorded generations, replay data and persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use neuroflap::{
//!     compute::evolution::EvolutionDriver,
//!     schema::EvolutionConfig,
//! };
//!
//! // Create configuration
//! let config = EvolutionConfig {
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//!
//! // Run twenty generations
//! let mut driver = EvolutionDriver::new(config).unwrap();
//! let summary = driver.run_batch(20, |_| {}).unwrap();
//!
//! println!("Best fitness after {} generations: {}", summary.generations, summary.best_fitness);
//! ```

pub mod compute;
pub mod history;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionDriver, EvolutionError, EvolutionSession};
pub use compute::{Agent, NeuralNetwork, World};
pub use history::{GenerationRef, HistoryStore};
pub use schema::{EvolutionConfig, GenerationStats, ProgressSnapshot};
