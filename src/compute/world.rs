//! Tick-based obstacle course: spawning, scrolling, scoring and collisions.

use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::agent::{Agent, DecisionContext};
use crate::schema::WorldConfig;

/// Agents per rayon work item.
const AGENTS_PER_TASK: usize = 16;

/// A scrolling wall with a single passable gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Left edge.
    pub x: f32,
    pub gap_center: f32,
    pub gap_height: f32,
    pub width: f32,
}

impl Obstacle {
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn gap_top(&self) -> f32 {
        self.gap_center - self.gap_height / 2.0
    }

    #[inline]
    pub fn gap_bottom(&self) -> f32 {
        self.gap_center + self.gap_height / 2.0
    }

    /// Fully past the left boundary.
    #[inline]
    pub fn is_offscreen(&self) -> bool {
        self.right() < 0.0
    }

    /// Whether a square box at (`x`, `y`) with side `size` hits the wall.
    ///
    /// The box is safe when it is horizontally clear of the wall or
    /// strictly inside the gap band.
    pub fn collides(&self, x: f32, y: f32, size: f32) -> bool {
        if x + size < self.x || x > self.right() {
            return false;
        }
        !(y > self.gap_top() && y + size < self.gap_bottom())
    }
}

/// Obstacle course state.
///
/// The world never owns agents; it borrows them for one tick at a time.
#[derive(Debug, Clone)]
pub struct World {
    config: WorldConfig,
    obstacles: Vec<Obstacle>,
    tick: u64,
    score: u64,
    /// Seed the current layout was generated from.
    seed: u64,
    /// Draws gap centers for the current layout.
    rng: StdRng,
    /// Draws layout seeds for successive resets.
    seeder: StdRng,
}

impl World {
    /// Create a world whose successive layouts derive from `seed`.
    pub fn new(config: WorldConfig, seed: u64) -> Self {
        let mut seeder = StdRng::seed_from_u64(seed);
        let layout_seed = seeder.next_u64();

        let mut world = Self {
            config,
            obstacles: Vec::new(),
            tick: 0,
            score: 0,
            seed: layout_seed,
            rng: StdRng::seed_from_u64(layout_seed),
            seeder,
        };
        world.reset_with_seed(layout_seed);
        world
    }

    /// Start a new layout drawn from the world's seeder.
    pub fn reset(&mut self) {
        let seed = self.seeder.next_u64();
        self.reset_with_seed(seed);
    }

    /// Start the layout identified by `seed`.
    ///
    /// Two resets with the same seed produce the same obstacle sequence.
    pub fn reset_with_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.obstacles.clear();
        self.tick = 0;
        self.score = 0;
        self.spawn();
    }

    fn spawn(&mut self) {
        let (lo, hi) = self.config.gap_center_range();
        let gap_center = if hi > lo {
            self.rng.gen_range(lo..hi)
        } else {
            lo
        };

        self.obstacles.push(Obstacle {
            x: self.config.width,
            gap_center,
            gap_height: self.config.gap_height,
            width: self.config.obstacle_width,
        });
    }

    /// Advance the course by one tick and update every live agent.
    ///
    /// Obstacle spawning, scrolling and removal finish before any agent
    /// reads the list. Agents only touch their own state, so they are
    /// updated in parallel.
    pub fn tick(&mut self, agents: &mut [Agent]) {
        self.tick += 1;

        if self.config.spawn_interval > 0 && self.tick % self.config.spawn_interval == 0 {
            self.spawn();
        }

        let speed = self.config.obstacle_speed;
        for obstacle in &mut self.obstacles {
            obstacle.x -= speed;
        }

        let before = self.obstacles.len();
        self.obstacles.retain(|o| !o.is_offscreen());
        self.score += (before - self.obstacles.len()) as u64;

        let obstacles = self.obstacles.as_slice();
        let config = &self.config;
        let tick = self.tick;

        agents
            .par_iter_mut()
            .with_min_len(AGENTS_PER_TASK)
            .filter(|agent| agent.is_alive())
            .for_each(|agent| step_agent(agent, obstacles, config, tick));
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// First obstacle whose right edge is still past `x`.
    pub fn next_obstacle(&self, x: f32) -> Option<&Obstacle> {
        next_obstacle(&self.obstacles, x)
    }
}

fn next_obstacle(obstacles: &[Obstacle], x: f32) -> Option<&Obstacle> {
    obstacles.iter().find(|o| o.right() > x)
}

fn step_agent(agent: &mut Agent, obstacles: &[Obstacle], config: &WorldConfig, tick: u64) {
    let x = agent.x();
    let ctx = match next_obstacle(obstacles, x) {
        Some(next) => DecisionContext {
            world_width: config.width,
            world_height: config.height,
            distance: next.x - x,
            gap_center: next.gap_center,
        },
        None => DecisionContext {
            world_width: config.width,
            world_height: config.height,
            distance: config.width,
            gap_center: config.height / 2.0,
        },
    };

    agent.decide(&ctx);
    agent.tick();

    let y = agent.y();
    let out_of_bounds = y < 0.0 || y > config.height - config.ground_height;
    if out_of_bounds || obstacles.iter().any(|o| o.collides(x, y, agent.size())) {
        agent.terminate(tick);
    }
}

/// Whether no agent is alive.
pub fn all_terminated(agents: &[Agent]) -> bool {
    agents.iter().all(|a| !a.is_alive())
}

pub fn alive_count(agents: &[Agent]) -> usize {
    agents.iter().filter(|a| a.is_alive()).count()
}
