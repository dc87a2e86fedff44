//! Generation loop: ticks the world, detects extinction, records and evolves.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rand::prelude::*;

use super::error::EvolutionError;
use super::population::{Population, PopulationSnapshot};
use crate::compute::{NetworkShape, World};
use crate::history::{GenerationRef, HistoryStore};
use crate::schema::{
    AGENT_INPUTS, AGENT_OUTPUTS, BatchSummary, EvolutionConfig, FitnessHistory, GenerationStats,
    ProgressSnapshot, StepOutcome, StopReason,
};

/// Owns the world, the population and the history of one evolution session.
///
/// Every mutation goes through `&mut self`, so a driver is either stepped
/// interactively or moved whole into a batch worker.
pub struct EvolutionDriver {
    config: EvolutionConfig,
    world: World,
    population: Population,
    history: HistoryStore,
    fitness_history: FitnessHistory,
    /// Seeds fresh populations on reset.
    seeder: StdRng,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionDriver {
    /// Validate `config` and build generation 1 on a fresh world.
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        config.validate()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut seeder = StdRng::seed_from_u64(seed);
        let world = World::new(config.world.clone(), seeder.next_u64());
        let population = Population::new(
            config.genetic.clone(),
            Self::shape(&config),
            config.agent,
            seeder.next_u64(),
        );
        debug!(
            "Driver created: {} agents, brain {}, seed {}",
            population.size(),
            population.shape(),
            seed
        );

        Ok(Self {
            config,
            world,
            population,
            history: HistoryStore::new(),
            fitness_history: FitnessHistory::default(),
            seeder,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    fn shape(config: &EvolutionConfig) -> NetworkShape {
        NetworkShape::new(AGENT_INPUTS, config.network.hidden, AGENT_OUTPUTS)
    }

    /// Get cancellation handle.
    ///
    /// Batch runs stop at the next tick or generation boundary once the
    /// flag is set. The flag is never cleared by the driver.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Advance one tick; evolve when the last agent has died.
    pub fn step_interactive(&mut self) -> Result<StepOutcome, EvolutionError> {
        self.world.tick(self.population.agents_mut());
        if self.population.all_terminated() {
            return Ok(StepOutcome::GenerationCompleted(self.turnover()?));
        }
        Ok(StepOutcome::Running)
    }

    /// Tick until every agent has died or the world reaches `max_ticks`.
    ///
    /// Hitting the bound is treated as extinction. Returns `None` when
    /// cancelled first; the partial generation is then left untouched.
    pub fn run_generation(
        &mut self,
        max_ticks: u64,
    ) -> Result<Option<GenerationStats>, EvolutionError> {
        self.run_generation_with(max_ticks, 0, &mut |_: &ProgressSnapshot| {})
    }

    fn run_generation_with<F>(
        &mut self,
        max_ticks: u64,
        progress_interval: u64,
        on_progress: &mut F,
    ) -> Result<Option<GenerationStats>, EvolutionError>
    where
        F: FnMut(&ProgressSnapshot),
    {
        loop {
            if self.is_cancelled() {
                self.rewind_generation();
                return Ok(None);
            }
            if self.population.all_terminated() {
                break;
            }
            if self.world.tick_count() >= max_ticks {
                warn!(
                    "Generation {} hit the tick bound of {} with {} agents alive",
                    self.population.generation(),
                    max_ticks,
                    self.population.alive_count()
                );
                break;
            }

            self.world.tick(self.population.agents_mut());

            if progress_interval > 0 && self.world.tick_count() % progress_interval == 0 {
                on_progress(&self.progress());
            }
        }

        self.turnover().map(Some)
    }

    /// Restart the current generation on the same layout, discarding its
    /// partial progress.
    fn rewind_generation(&mut self) {
        if self.world.tick_count() == 0 {
            return;
        }
        debug!(
            "Generation {} cancelled at tick {}, rewinding",
            self.population.generation(),
            self.world.tick_count()
        );
        self.population.reset_agents();
        self.world.reset_with_seed(self.world.seed());
    }

    /// Run `generations` complete generations, or until cancelled.
    ///
    /// A generation interrupted by cancellation is rewound to its first
    /// tick, so the driver is left at a generation boundary.
    pub fn run_batch<F>(
        &mut self,
        generations: usize,
        mut on_progress: F,
    ) -> Result<BatchSummary, EvolutionError>
    where
        F: FnMut(&ProgressSnapshot),
    {
        let start_time = Instant::now();
        let max_ticks = self.config.driver.max_ticks_per_generation;
        let interval = self.config.driver.progress_interval;
        debug!("Batch started: {generations} generations, tick bound {max_ticks}");

        let mut completed = 0;
        let mut total_ticks = 0;
        let mut tick_bound_hits = 0;

        let stop_reason = loop {
            if self.is_cancelled() {
                break StopReason::Cancelled;
            }
            if completed >= generations {
                break StopReason::Completed;
            }

            let Some(stats) = self.run_generation_with(max_ticks, interval, &mut on_progress)?
            else {
                break StopReason::Cancelled;
            };

            completed += 1;
            total_ticks += stats.ticks;
            if stats.alive_count > 0 {
                tick_bound_hits += 1;
            }
            on_progress(&self.progress());
        };

        let summary = BatchSummary {
            generations: completed,
            total_ticks,
            tick_bound_hits,
            best_fitness: self.history.best_fitness_ever(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
            stop_reason,
        };
        debug!(
            "Batch stopped ({:?}) after {} generations",
            summary.stop_reason, summary.generations
        );
        Ok(summary)
    }

    /// End the current generation immediately, whoever is still alive.
    pub fn force_next_generation(&mut self) -> Result<GenerationStats, EvolutionError> {
        debug!(
            "Forcing turnover of generation {} at tick {}",
            self.population.generation(),
            self.world.tick_count()
        );
        self.turnover()
    }

    fn turnover(&mut self) -> Result<GenerationStats, EvolutionError> {
        let generation_best = self.population.generation_best();
        let stats = GenerationStats {
            generation: self.population.generation(),
            best_fitness: generation_best,
            average_fitness: self.population.average_fitness(),
            best_fitness_ever: self.population.best_fitness().max(generation_best),
            alive_count: self.population.alive_count(),
            score: self.world.score(),
            ticks: self.world.tick_count(),
            world_seed: self.world.seed(),
        };

        self.history.record(&stats, &self.population);
        self.fitness_history.push(&stats);
        self.population.evolve()?;
        self.world.reset();

        info!(
            "Generation {}: best {:.0}, avg {:.1}, best ever {:.0}, score {}, {} ticks",
            stats.generation,
            stats.best_fitness,
            stats.average_fitness,
            stats.best_fitness_ever,
            stats.score,
            stats.ticks
        );
        Ok(stats)
    }

    /// Fresh random population on a fresh layout, recorded as a new run.
    pub fn reset_population(&mut self) {
        self.population = Population::new(
            self.config.genetic.clone(),
            Self::shape(&self.config),
            self.config.agent,
            self.seeder.next_u64(),
        );
        self.world.reset();
        self.history.start_run();
        self.fitness_history.clear();
        debug!("Population reset, history run {}", self.history.runs().len());
    }

    /// Replay a recorded generation on its original obstacle layout.
    ///
    /// Brains and best-ever state come from the record; agent physics and
    /// fitness restart from scratch. Generations played from here on are
    /// recorded as a new run.
    pub fn load_generation(&mut self, at: GenerationRef) -> Result<(), EvolutionError> {
        let record = self
            .history
            .get(at)
            .ok_or(EvolutionError::UnknownGeneration {
                run: at.run,
                index: at.index,
            })?;

        self.population.restore(&record.population)?;
        self.population.reset_agents();
        self.world.reset_with_seed(record.world_seed);
        debug!(
            "Replaying generation {} (run {}, index {}) on layout {}",
            record.generation, at.run, at.index, record.world_seed
        );

        self.history.start_run();
        Ok(())
    }

    /// Replay the best generation ever recorded. Returns `false` when the
    /// history is empty.
    pub fn replay_best(&mut self) -> Result<bool, EvolutionError> {
        let Some(best) = self.history.best_ever() else {
            return Ok(false);
        };

        self.population.restore(&best.population)?;
        self.population.reset_agents();
        self.world.reset_with_seed(best.world_seed);
        debug!(
            "Replaying best generation {} (fitness {:.0}) on layout {}",
            best.generation, best.best_fitness, best.world_seed
        );

        self.history.start_run();
        Ok(true)
    }

    /// Replace the live brains with `snapshot` and restart the current layout.
    ///
    /// Used to evaluate externally prepared brains. History is untouched.
    pub fn restore_population(
        &mut self,
        snapshot: &PopulationSnapshot,
    ) -> Result<(), EvolutionError> {
        self.population.restore(snapshot)?;
        self.population.reset_agents();
        self.world.reset_with_seed(self.world.seed());
        debug!(
            "Population restored to generation {}",
            self.population.generation()
        );
        Ok(())
    }

    /// Scalar view of the live state.
    pub fn progress(&self) -> ProgressSnapshot {
        let current_fitness = self.population.generation_best();
        ProgressSnapshot {
            generation: self.population.generation(),
            tick: self.world.tick_count(),
            alive_count: self.population.alive_count(),
            population_size: self.population.size(),
            current_fitness,
            average_fitness: self.population.average_fitness(),
            best_fitness: self.population.best_fitness().max(current_fitness),
            score: self.world.score(),
            running: false,
        }
    }

    pub fn save_history<W: Write>(&self, writer: &mut W) -> Result<(), EvolutionError> {
        Ok(self.history.save(writer)?)
    }

    /// Replace the recorded history with one read from `reader`.
    pub fn load_history<R: Read>(&mut self, reader: &mut R) -> Result<(), EvolutionError> {
        self.history = HistoryStore::load(reader)?;
        debug!("Loaded history with {} generations", self.history.len());
        Ok(())
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn fitness_history(&self) -> &FitnessHistory {
        &self.fitness_history
    }
}
