//! Configuration types for the obstacle course and the genetic algorithm.

use serde::{Deserialize, Serialize};

/// Number of sensor inputs fed to every agent brain.
pub const AGENT_INPUTS: usize = 4;

/// Number of outputs produced by every agent brain (jump / no jump).
pub const AGENT_OUTPUTS: usize = 1;

/// Top-level configuration for an evolution session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Brain layout.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Agent physics.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Obstacle course geometry and pacing.
    #[serde(default)]
    pub world: WorldConfig,
    /// Selection, crossover and mutation settings.
    #[serde(default)]
    pub genetic: GeneticConfig,
    /// Generation loop settings.
    #[serde(default)]
    pub driver: DriverConfig,
    /// Random seed for reproducibility.
    /// Seeds both the population RNG and the obstacle layout seeder.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            agent: AgentConfig::default(),
            world: WorldConfig::default(),
            genetic: GeneticConfig::default(),
            driver: DriverConfig::default(),
            random_seed: None,
        }
    }
}

/// Brain layout. Input and output widths are fixed by the agent sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer width.
    #[serde(default = "default_hidden")]
    pub hidden: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden: default_hidden(),
        }
    }
}

fn default_hidden() -> usize {
    8
}

/// Vertical physics of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Fixed horizontal position of every agent.
    #[serde(default = "default_agent_x")]
    pub x: f32,
    /// Side length of the agent bounding box.
    #[serde(default = "default_agent_size")]
    pub size: f32,
    /// Vertical position after a reset.
    #[serde(default = "default_start_y")]
    pub start_y: f32,
    /// Velocity added every tick (positive is downwards).
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Velocity assigned by a jump (negative is upwards).
    #[serde(default = "default_jump_impulse")]
    pub jump_impulse: f32,
    /// Divisor used to normalize velocity for the brain.
    #[serde(default = "default_velocity_scale")]
    pub velocity_scale: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            x: default_agent_x(),
            size: default_agent_size(),
            start_y: default_start_y(),
            gravity: default_gravity(),
            jump_impulse: default_jump_impulse(),
            velocity_scale: default_velocity_scale(),
        }
    }
}

fn default_agent_x() -> f32 {
    50.0
}
fn default_agent_size() -> f32 {
    30.0
}
fn default_start_y() -> f32 {
    300.0
}
fn default_gravity() -> f32 {
    0.8
}
fn default_jump_impulse() -> f32 {
    -12.0
}
fn default_velocity_scale() -> f32 {
    15.0
}

/// Obstacle course geometry and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Playfield width.
    #[serde(default = "default_world_width")]
    pub width: f32,
    /// Playfield height.
    #[serde(default = "default_world_height")]
    pub height: f32,
    /// Height of the ground band at the bottom of the playfield.
    #[serde(default = "default_ground_height")]
    pub ground_height: f32,
    /// Horizontal extent of an obstacle.
    #[serde(default = "default_obstacle_width")]
    pub obstacle_width: f32,
    /// Vertical extent of the passable gap.
    #[serde(default = "default_gap_height")]
    pub gap_height: f32,
    /// Minimum distance kept between the gap center draw range and the playfield edges.
    #[serde(default = "default_gap_margin")]
    pub gap_margin: f32,
    /// Leftward movement of every obstacle per tick.
    #[serde(default = "default_obstacle_speed")]
    pub obstacle_speed: f32,
    /// Ticks between obstacle spawns.
    #[serde(default = "default_spawn_interval")]
    pub spawn_interval: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_width(),
            height: default_world_height(),
            ground_height: default_ground_height(),
            obstacle_width: default_obstacle_width(),
            gap_height: default_gap_height(),
            gap_margin: default_gap_margin(),
            obstacle_speed: default_obstacle_speed(),
            spawn_interval: default_spawn_interval(),
        }
    }
}

fn default_world_width() -> f32 {
    800.0
}
fn default_world_height() -> f32 {
    600.0
}
fn default_ground_height() -> f32 {
    20.0
}
fn default_obstacle_width() -> f32 {
    80.0
}
fn default_gap_height() -> f32 {
    150.0
}
fn default_gap_margin() -> f32 {
    100.0
}
fn default_obstacle_speed() -> f32 {
    3.0
}
fn default_spawn_interval() -> u64 {
    120
}

/// Genetic algorithm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Number of agents per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Fraction of the population carried over unmodified (rounded up).
    #[serde(default = "default_elitism_rate")]
    pub elitism_rate: f32,
    /// Per-gene mutation probability (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Standard deviation of the Gaussian mutation noise.
    #[serde(default = "default_mutation_strength")]
    pub mutation_strength: f32,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            elitism_rate: default_elitism_rate(),
            mutation_rate: default_mutation_rate(),
            mutation_strength: default_mutation_strength(),
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_elitism_rate() -> f32 {
    0.02
}
fn default_mutation_rate() -> f32 {
    0.1
}
fn default_mutation_strength() -> f32 {
    0.1
}

/// Generation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Batch-mode liveness bound: a generation still running after this
    /// many ticks is treated as if every agent had died.
    #[serde(default = "default_max_ticks")]
    pub max_ticks_per_generation: u64,
    /// Publish a progress snapshot every N ticks during batch runs (0 = only per generation).
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_ticks_per_generation: default_max_ticks(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_max_ticks() -> u64 {
    2000
}
fn default_progress_interval() -> u64 {
    0
}

impl GeneticConfig {
    /// Number of elites for a population of `size`: `ceil(size * elitism_rate)`, capped at `size`.
    pub fn elite_count(&self, size: usize) -> usize {
        // f32 rates like 0.3 sit slightly above their decimal value
        let raw = (size as f64 * f64::from(self.elitism_rate) - 1e-6).ceil();
        (raw.max(0.0) as usize).min(size)
    }
}

impl WorldConfig {
    /// Inclusive range the gap center is drawn from.
    ///
    /// Collapses to the lower bound when the gap does not fit.
    pub fn gap_center_range(&self) -> (f32, f32) {
        let lo = self.gap_margin;
        let hi = (self.height - self.gap_margin - self.gap_height).max(lo);
        (lo, hi)
    }
}

impl EvolutionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.hidden == 0 {
            return Err(ConfigError::InvalidHiddenSize);
        }
        if self.genetic.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }

        let check_rate = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::RateOutOfRange { name, value })
            }
        };
        check_rate(self.genetic.elitism_rate, "elitism_rate")?;
        check_rate(self.genetic.mutation_rate, "mutation_rate")?;

        if !self.genetic.mutation_strength.is_finite() || self.genetic.mutation_strength < 0.0 {
            return Err(ConfigError::InvalidMutationStrength(
                self.genetic.mutation_strength,
            ));
        }

        let world = &self.world;
        if world.width <= 0.0 || world.height <= 0.0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if world.ground_height < 0.0 || world.ground_height >= world.height {
            return Err(ConfigError::InvalidGround);
        }
        if world.obstacle_width <= 0.0 || world.gap_height <= 0.0 {
            return Err(ConfigError::InvalidObstacle);
        }
        if world.obstacle_speed < 0.0 {
            return Err(ConfigError::InvalidSpeed);
        }
        if world.spawn_interval == 0 {
            return Err(ConfigError::InvalidSpawnInterval);
        }

        if self.agent.velocity_scale <= 0.0 {
            return Err(ConfigError::InvalidVelocityScale);
        }
        if self.driver.max_ticks_per_generation == 0 {
            return Err(ConfigError::InvalidTickBound);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Hidden layer size must be non-zero")]
    InvalidHiddenSize,
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f32 },
    #[error("Mutation strength must be finite and non-negative, got {0}")]
    InvalidMutationStrength(f32),
    #[error("World dimensions must be positive")]
    InvalidDimensions,
    #[error("Ground height must be within [0, height)")]
    InvalidGround,
    #[error("Obstacle width and gap height must be positive")]
    InvalidObstacle,
    #[error("Obstacle speed must be non-negative")]
    InvalidSpeed,
    #[error("Spawn interval must be non-zero")]
    InvalidSpawnInterval,
    #[error("Velocity scale must be positive")]
    InvalidVelocityScale,
    #[error("Max ticks per generation must be non-zero")]
    InvalidTickBound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_elite_count_rounds_up() {
        let genetic = GeneticConfig {
            elitism_rate: 0.02,
            ..Default::default()
        };
        assert_eq!(genetic.elite_count(50), 1);
        assert_eq!(genetic.elite_count(51), 2);
        assert_eq!(genetic.elite_count(0), 0);

        let thirty_percent = GeneticConfig {
            elitism_rate: 0.3,
            ..Default::default()
        };
        assert_eq!(thirty_percent.elite_count(10), 3);

        let all = GeneticConfig {
            elitism_rate: 1.0,
            ..Default::default()
        };
        assert_eq!(all.elite_count(7), 7);
    }

    #[test]
    fn test_gap_range_collapses_when_gap_does_not_fit() {
        let world = WorldConfig {
            height: 200.0,
            gap_height: 150.0,
            gap_margin: 100.0,
            ..Default::default()
        };
        assert_eq!(world.gap_center_range(), (100.0, 100.0));
        assert_eq!(WorldConfig::default().gap_center_range(), (100.0, 350.0));
    }

    #[test]
    fn test_rejects_bad_rates() {
        let mut config = EvolutionConfig::default();
        config.genetic.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RateOutOfRange {
                name: "mutation_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_serialization_fills_defaults() {
        let parsed: EvolutionConfig =
            serde_json::from_str(r#"{"genetic": {"population_size": 12}, "random_seed": 7}"#)
                .unwrap();
        assert_eq!(parsed.genetic.population_size, 12);
        assert_eq!(parsed.genetic.mutation_rate, 0.1);
        assert_eq!(parsed.world.spawn_interval, 120);
        assert_eq!(parsed.random_seed, Some(7));
    }
}
