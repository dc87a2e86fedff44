//! Fixed-size population and the generational genetic algorithm step.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::EvolutionError;
use crate::compute::{Agent, NetworkError, NetworkShape, NeuralNetwork, world};
use crate::schema::{AgentConfig, GeneticConfig};

/// Deep, independent copy of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: usize,
    pub agents: Vec<Agent>,
    pub best_fitness: f32,
    pub best_brain: Option<NeuralNetwork>,
}

/// Agents of the current generation plus the best brain ever seen.
///
/// The agent array is double-buffered: `evolve` writes the next
/// generation into the back buffer in place and then swaps, so brains
/// keep stable indices and allocations across generations.
#[derive(Debug)]
pub struct Population {
    config: GeneticConfig,
    shape: NetworkShape,
    agents: Vec<Agent>,
    spare: Vec<Agent>,
    generation: usize,
    best_fitness: f32,
    best_brain: Option<NeuralNetwork>,
    /// Index of the live agent carrying `best_brain`.
    champion: Option<usize>,
    rng: StdRng,
}

impl Population {
    /// Create `config.population_size` agents with random brains.
    pub fn new(
        config: GeneticConfig,
        shape: NetworkShape,
        physics: AgentConfig,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents: Vec<Agent> = (0..config.population_size)
            .map(|_| Agent::new(NeuralNetwork::random(shape, &mut rng), physics))
            .collect();
        let spare = agents.clone();

        Self {
            config,
            shape,
            agents,
            spare,
            generation: 1,
            best_fitness: 0.0,
            best_brain: None,
            champion: None,
            rng,
        }
    }

    /// Produce the next generation from the current fitness values.
    ///
    /// Best-ever tracking, stable ranking, elitism, then roulette
    /// parents with uniform crossover and Gaussian mutation for the
    /// remaining slots.
    pub fn evolve(&mut self) -> Result<(), NetworkError> {
        let size = self.agents.len();

        // Stable: equal fitness keeps array order.
        let mut ranked: Vec<usize> = (0..size).collect();
        ranked.sort_by(|&a, &b| {
            self.agents[b]
                .fitness()
                .total_cmp(&self.agents[a].fitness())
        });

        if let Some(&top) = ranked.first() {
            let gen_best = self.agents[top].fitness();
            if gen_best > self.best_fitness {
                self.best_fitness = gen_best;
                self.best_brain = Some(self.agents[top].brain().clone());
            }
        }

        let elites = self.config.elite_count(size);
        for (slot, &source) in ranked.iter().take(elites).enumerate() {
            self.spare[slot]
                .brain_mut()
                .copy_from(self.agents[source].brain())?;
            self.spare[slot].reset();
        }

        let total: f32 = self.agents.iter().map(Agent::fitness).sum();
        for slot in elites..size {
            let first = roulette(&self.agents, total, &mut self.rng);
            let second = roulette(&self.agents, total, &mut self.rng);

            let child = &mut self.spare[slot];
            NeuralNetwork::crossover_into(
                self.agents[first].brain(),
                self.agents[second].brain(),
                child.brain_mut(),
                &mut self.rng,
            )?;
            child.brain_mut().mutate(
                self.config.mutation_rate,
                self.config.mutation_strength,
                &mut self.rng,
            );
            child.reset();
        }

        std::mem::swap(&mut self.agents, &mut self.spare);
        self.generation += 1;
        self.update_champion();
        Ok(())
    }

    fn update_champion(&mut self) {
        self.champion = self
            .best_brain
            .as_ref()
            .and_then(|best| self.agents.iter().position(|a| a.brain() == best));
    }

    /// Reset physics and fitness of every agent, keeping brains.
    pub fn reset_agents(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
    }

    /// Deep copy for history and replay.
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            generation: self.generation,
            agents: self.agents.clone(),
            best_fitness: self.best_fitness,
            best_brain: self.best_brain.clone(),
        }
    }

    /// Replace the live population with a copy of `snapshot`.
    ///
    /// The snapshot must have the same size and brain shape.
    pub fn restore(&mut self, snapshot: &PopulationSnapshot) -> Result<(), EvolutionError> {
        if snapshot.agents.len() != self.agents.len() {
            return Err(EvolutionError::SnapshotSize {
                expected: self.agents.len(),
                found: snapshot.agents.len(),
            });
        }
        for (index, agent) in snapshot.agents.iter().enumerate() {
            self.check_brain(agent.brain())
                .map_err(|source| EvolutionError::SnapshotBrain { index, source })?;
        }
        if let Some(best) = &snapshot.best_brain {
            self.check_brain(best).map_err(|source| EvolutionError::SnapshotBrain {
                index: snapshot.agents.len(),
                source,
            })?;
        }

        self.agents.clone_from(&snapshot.agents);
        self.spare.clone_from(&snapshot.agents);
        self.generation = snapshot.generation;
        self.best_fitness = snapshot.best_fitness;
        self.best_brain = snapshot.best_brain.clone();
        self.update_champion();
        Ok(())
    }

    fn check_brain(&self, brain: &NeuralNetwork) -> Result<(), NetworkError> {
        if brain.shape() != self.shape {
            return Err(NetworkError::ShapeMismatch {
                expected: self.shape,
                found: brain.shape(),
            });
        }
        brain.validate()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn shape(&self) -> NetworkShape {
        self.shape
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Best fitness ever observed. Never decreases.
    pub fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    /// Frozen copy of the brain that achieved `best_fitness`.
    pub fn best_brain(&self) -> Option<&NeuralNetwork> {
        self.best_brain.as_ref()
    }

    /// Index of the live agent whose brain is the best-ever brain.
    pub fn champion(&self) -> Option<usize> {
        self.champion
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// Highest fitness in the current generation.
    pub fn generation_best(&self) -> f32 {
        self.agents
            .iter()
            .map(Agent::fitness)
            .fold(0.0, f32::max)
    }

    pub fn average_fitness(&self) -> f32 {
        if self.agents.is_empty() {
            return 0.0;
        }
        self.agents.iter().map(Agent::fitness).sum::<f32>() / self.agents.len() as f32
    }

    pub fn alive_count(&self) -> usize {
        world::alive_count(&self.agents)
    }

    pub fn all_terminated(&self) -> bool {
        world::all_terminated(&self.agents)
    }
}

/// Fitness-proportionate selection over `agents` in array order.
///
/// Falls back to index 0 when the population is empty, the total
/// fitness is not positive, or rounding leaves the draw unmatched.
pub fn roulette<R: Rng + ?Sized>(agents: &[Agent], total_fitness: f32, rng: &mut R) -> usize {
    if agents.is_empty() || total_fitness <= 0.0 {
        return 0;
    }

    let draw = rng.r#gen::<f32>() * total_fitness;
    let mut cumulative = 0.0;
    for (i, agent) in agents.iter().enumerate() {
        cumulative += agent.fitness();
        if cumulative > draw {
            return i;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: NetworkShape = NetworkShape::new(4, 8, 1);

    fn population(size: usize, elitism_rate: f32, mutation_rate: f32) -> Population {
        let config = GeneticConfig {
            population_size: size,
            elitism_rate,
            mutation_rate,
            mutation_strength: 0.1,
        };
        Population::new(config, SHAPE, AgentConfig::default(), 11)
    }

    fn set_fitness(pop: &mut Population, values: &[f32]) {
        for (agent, &value) in pop.agents_mut().iter_mut().zip(values) {
            agent.set_fitness(value);
        }
    }

    #[test]
    fn test_new_population() {
        let pop = population(10, 0.1, 0.1);
        assert_eq!(pop.size(), 10);
        assert_eq!(pop.generation(), 1);
        assert_eq!(pop.best_fitness(), 0.0);
        assert!(pop.best_brain().is_none());
        assert!(pop.agents().iter().all(|a| a.is_alive()));
    }

    #[test]
    fn test_evolve_keeps_size_and_elites() {
        let mut pop = population(10, 0.3, 0.5);
        set_fitness(&mut pop, &[3.0, 9.0, 1.0, 7.0, 0.0, 8.0, 2.0, 5.0, 4.0, 6.0]);
        let top: Vec<NeuralNetwork> = [1, 5, 3]
            .iter()
            .map(|&i| pop.agents()[i].brain().clone())
            .collect();

        pop.evolve().unwrap();

        assert_eq!(pop.size(), 10);
        assert_eq!(pop.generation(), 2);
        for (slot, brain) in top.iter().enumerate() {
            assert_eq!(pop.agents()[slot].brain(), brain);
        }
        assert!(pop.agents().iter().all(|a| a.is_alive() && a.fitness() == 0.0));
    }

    #[test]
    fn test_elite_ties_keep_array_order() {
        let mut pop = population(4, 0.5, 0.0);
        set_fitness(&mut pop, &[2.0, 5.0, 5.0, 5.0]);
        let expected = [pop.agents()[1].brain().clone(), pop.agents()[2].brain().clone()];

        pop.evolve().unwrap();
        assert_eq!(pop.agents()[0].brain(), &expected[0]);
        assert_eq!(pop.agents()[1].brain(), &expected[1]);
    }

    #[test]
    fn test_best_ever_is_monotone_and_frozen() {
        let mut pop = population(6, 0.2, 0.3);
        let mut last = 0.0;
        for round in [4.0, 10.0, 2.0, 10.0, 12.0, 1.0] {
            let values: Vec<f32> = (0..6).map(|i| round - i as f32 * 0.5).collect();
            set_fitness(&mut pop, &values);
            pop.evolve().unwrap();
            assert!(pop.best_fitness() >= last);
            last = pop.best_fitness();
        }
        assert_eq!(last, 12.0);

        let frozen = pop.best_brain().cloned().unwrap();
        for agent in pop.agents_mut() {
            agent.brain_mut().mutate(1.0, 1.0, &mut StdRng::seed_from_u64(0));
        }
        assert_eq!(pop.best_brain(), Some(&frozen));
    }

    #[test]
    fn test_champion_tracks_best_brain() {
        let mut pop = population(5, 0.2, 0.2);
        set_fitness(&mut pop, &[1.0, 2.0, 30.0, 4.0, 5.0]);
        let best = pop.agents()[2].brain().clone();
        pop.evolve().unwrap();

        assert_eq!(pop.champion(), Some(0));
        assert_eq!(pop.best_brain(), Some(&best));
    }

    #[test]
    fn test_children_inherit_only_from_selected_parents() {
        let mut pop = population(6, 0.0, 0.0);
        set_fitness(&mut pop, &[0.0, 5.0, 0.0, 0.0, 5.0, 0.0]);
        let a = pop.agents()[1].brain().clone();
        let b = pop.agents()[4].brain().clone();

        pop.evolve().unwrap();
        for child in pop.agents() {
            for ((gene, ga), gb) in child.brain().genes().zip(a.genes()).zip(b.genes()) {
                assert!(gene == ga || gene == gb);
            }
        }
    }

    #[test]
    fn test_zero_fitness_still_evolves() {
        let mut pop = population(4, 0.0, 0.0);
        let first = pop.agents()[0].brain().clone();
        pop.evolve().unwrap();

        // every parent falls back to index 0, so every child is a copy of it
        assert!(pop.agents().iter().all(|a| a.brain() == &first));
        assert_eq!(pop.best_fitness(), 0.0);
        assert!(pop.best_brain().is_none());
    }

    #[test]
    fn test_roulette_fallbacks() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(roulette(&[], 10.0, &mut rng), 0);

        let mut pop = population(3, 0.0, 0.0);
        assert_eq!(roulette(pop.agents(), 0.0, &mut rng), 0);

        set_fitness(&mut pop, &[0.0, 0.0, 7.0]);
        for _ in 0..100 {
            assert_eq!(roulette(pop.agents(), 7.0, &mut rng), 2);
        }
    }

    #[test]
    fn test_roulette_is_proportional() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut pop = population(2, 0.0, 0.0);
        set_fitness(&mut pop, &[1.0, 3.0]);

        let draws = 20_000;
        let picks = (0..draws)
            .filter(|_| roulette(pop.agents(), 4.0, &mut rng) == 1)
            .count();
        let share = picks as f64 / draws as f64;
        assert!((share - 0.75).abs() < 0.02, "share {share}");
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut pop = population(4, 0.25, 0.5);
        set_fitness(&mut pop, &[1.0, 2.0, 3.0, 4.0]);
        let snapshot = pop.snapshot();
        let copy = snapshot.clone();

        pop.evolve().unwrap();
        for agent in pop.agents_mut() {
            agent.brain_mut().mutate(1.0, 1.0, &mut StdRng::seed_from_u64(3));
        }
        assert_eq!(snapshot, copy);
        assert_eq!(snapshot.agents[3].fitness(), 4.0);
    }

    #[test]
    fn test_restore_round_trip_and_rejects_size() {
        let mut pop = population(4, 0.25, 0.5);
        set_fitness(&mut pop, &[1.0, 2.0, 3.0, 4.0]);
        let snapshot = pop.snapshot();
        pop.evolve().unwrap();
        pop.evolve().unwrap();

        pop.restore(&snapshot).unwrap();
        assert_eq!(pop.snapshot(), snapshot);

        let mut small = population(3, 0.25, 0.5);
        assert!(matches!(
            small.restore(&snapshot),
            Err(EvolutionError::SnapshotSize {
                expected: 3,
                found: 4
            })
        ));
    }
}
