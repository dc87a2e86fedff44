//! Agent: one brain coupled to vertical physics and a fitness counter.

use serde::{Deserialize, Serialize};

use super::network::NeuralNetwork;
use crate::schema::AgentConfig;

/// What an agent senses about the course on a given tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionContext {
    pub world_width: f32,
    pub world_height: f32,
    /// Horizontal distance from the agent to the next obstacle.
    pub distance: f32,
    /// Gap center of the next obstacle.
    pub gap_center: f32,
}

/// A simulated entity controlled by its own network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    brain: NeuralNetwork,
    physics: AgentConfig,
    y: f32,
    velocity: f32,
    fitness: f32,
    alive: bool,
    /// World tick on which the agent was terminated.
    death_tick: Option<u64>,
}

impl Agent {
    /// Wrap a brain in a freshly reset agent.
    pub fn new(brain: NeuralNetwork, physics: AgentConfig) -> Self {
        Self {
            brain,
            physics,
            y: physics.start_y,
            velocity: 0.0,
            fitness: 0.0,
            alive: true,
            death_tick: None,
        }
    }

    /// Sense, think and possibly jump.
    pub fn decide(&mut self, ctx: &DecisionContext) {
        if !self.alive {
            return;
        }
        let inputs = self.sense(ctx);
        let outputs = self.brain.forward(&inputs);
        if outputs.first().is_some_and(|&o| o > 0.5) {
            self.jump();
        }
    }

    /// Normalized sensor vector fed to the brain.
    pub fn sense(&self, ctx: &DecisionContext) -> [f32; 4] {
        [
            self.y / ctx.world_height,
            self.velocity / self.physics.velocity_scale,
            ctx.distance / ctx.world_width,
            ctx.gap_center / ctx.world_height,
        ]
    }

    /// Gravity, integrate position, and count one surviving tick.
    pub fn tick(&mut self) {
        if !self.alive {
            return;
        }
        self.velocity += self.physics.gravity;
        self.y += self.velocity;
        self.fitness += 1.0;
    }

    pub fn jump(&mut self) {
        self.velocity = self.physics.jump_impulse;
    }

    /// Restore physics and fitness. The brain is kept.
    pub fn reset(&mut self) {
        self.y = self.physics.start_y;
        self.velocity = 0.0;
        self.fitness = 0.0;
        self.alive = true;
        self.death_tick = None;
    }

    /// Mark the agent dead at world tick `tick`. Idempotent.
    pub fn terminate(&mut self, tick: u64) {
        if self.alive {
            self.alive = false;
            self.death_tick = Some(tick);
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.physics.x
    }

    #[inline]
    pub fn size(&self) -> f32 {
        self.physics.size
    }

    #[inline]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    #[inline]
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    /// Test and benchmark hook for seeding fitness without simulating.
    ///
    /// Simulation code never calls this; during a generation fitness only
    /// grows through `tick` and is cleared by `reset`.
    #[doc(hidden)]
    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }

    pub fn death_tick(&self) -> Option<u64> {
        self.death_tick
    }

    pub fn brain(&self) -> &NeuralNetwork {
        &self.brain
    }

    pub fn brain_mut(&mut self) -> &mut NeuralNetwork {
        &mut self.brain
    }

    pub fn physics(&self) -> &AgentConfig {
        &self.physics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::NetworkShape;

    fn constant_brain(bias: f32) -> NeuralNetwork {
        let shape = NetworkShape::new(4, 1, 1);
        NeuralNetwork::from_parts(shape, vec![0.0; 4], vec![0.0], vec![0.0], vec![bias]).unwrap()
    }

    fn ctx() -> DecisionContext {
        DecisionContext {
            world_width: 800.0,
            world_height: 600.0,
            distance: 400.0,
            gap_center: 300.0,
        }
    }

    #[test]
    fn test_tick_applies_gravity_then_moves() {
        let mut agent = Agent::new(constant_brain(-10.0), AgentConfig::default());
        agent.tick();
        assert!((agent.velocity() - 0.8).abs() < 1e-6);
        assert!((agent.y() - 300.8).abs() < 1e-4);
        assert_eq!(agent.fitness(), 1.0);
    }

    #[test]
    fn test_decide_jumps_above_threshold() {
        let mut jumper = Agent::new(constant_brain(10.0), AgentConfig::default());
        jumper.tick();
        jumper.decide(&ctx());
        assert_eq!(jumper.velocity(), -12.0);

        let mut idle = Agent::new(constant_brain(-10.0), AgentConfig::default());
        idle.decide(&ctx());
        assert_eq!(idle.velocity(), 0.0);
    }

    #[test]
    fn test_jump_ignores_current_velocity() {
        let mut agent = Agent::new(constant_brain(0.0), AgentConfig::default());
        for _ in 0..10 {
            agent.tick();
        }
        agent.jump();
        assert_eq!(agent.velocity(), -12.0);
    }

    #[test]
    fn test_sense_normalizes_inputs() {
        let mut agent = Agent::new(constant_brain(0.0), AgentConfig::default());
        agent.jump();
        let inputs = agent.sense(&ctx());
        assert_eq!(inputs, [0.5, -12.0 / 15.0, 0.5, 0.5]);
    }

    #[test]
    fn test_terminated_agent_is_frozen() {
        let mut agent = Agent::new(constant_brain(10.0), AgentConfig::default());
        agent.tick();
        agent.terminate(1);
        let frozen = agent.clone();

        agent.tick();
        agent.decide(&ctx());
        agent.terminate(5);
        assert_eq!(agent, frozen);
        assert_eq!(agent.death_tick(), Some(1));
    }

    #[test]
    fn test_reset_keeps_brain() {
        let brain = constant_brain(0.25);
        let mut agent = Agent::new(brain.clone(), AgentConfig::default());
        agent.tick();
        agent.terminate(1);
        agent.reset();

        assert!(agent.is_alive());
        assert_eq!(agent.fitness(), 0.0);
        assert_eq!(agent.y(), 300.0);
        assert_eq!(agent.death_tick(), None);
        assert_eq!(agent.brain(), &brain);
    }
}
