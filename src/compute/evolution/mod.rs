//! Generational neuroevolution of obstacle-course agents.
//!
//! # Overview
//!
//! - **Population** (`population`): fixed-size agent set, ranking, elitism,
//!   roulette selection, crossover and mutation
//! - **Driver** (`driver`): the generation loop binding the world, the
//!   population and the history store
//! - **Session** (`session`): moves the driver onto a worker thread for
//!   batch runs and publishes progress snapshots
//!
//! # Example
//!
//! ```rust,no_run
//! use neuroflap::compute::evolution::EvolutionDriver;
//! use neuroflap::schema::EvolutionConfig;
//!
//! let mut driver = EvolutionDriver::new(EvolutionConfig::default()).unwrap();
//! let summary = driver
//!     .run_batch(10, |progress| {
//!         println!(
//!             "Generation {}: best fitness = {:.1}",
//!             progress.generation, progress.best_fitness
//!         );
//!     })
//!     .unwrap();
//!
//! println!("Best fitness ever: {:.1}", summary.best_fitness);
//! ```

mod driver;
mod error;
mod population;
mod session;

pub use driver::EvolutionDriver;
pub use error::EvolutionError;
pub use population::{Population, PopulationSnapshot, roulette};
pub use session::EvolutionSession;
