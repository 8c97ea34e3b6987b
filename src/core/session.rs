use tracing::info;

use crate::config::RunConfig;
use crate::error::{ConfigError, RunError};
use crate::grid::{Cell, Grid};
use crate::map::{MapComposer, TileMap};
use crate::prng::{stream_rng, StreamRng};
use crate::qlearning::{PathOutcome, PathfinderConfig, QLearningPathfinder};
use crate::random_walk::{RandomWalk, RandomWalkConfig, WalkOutcome};

/// Explicit host-driven lifecycle: `configure` → `generate` → `run_*`.
///
/// Every pathfinding run draws from a fresh exploration generator seeded with
/// `exploration_seed`, so repeated runs with the same inputs agree.
#[derive(Debug, Clone)]
pub struct Session {
    config: RunConfig,
    composer: MapComposer,
    map: Option<TileMap>,
}

impl Session {
    pub fn configure(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let composer = MapComposer::new(config.map.clone())?;
        Ok(Self {
            config,
            composer,
            map: None,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build the map, replacing any previous one.
    pub fn generate(&mut self) -> Result<&TileMap, RunError> {
        let map = self.composer.generate()?;
        Ok(&*self.map.insert(map))
    }

    pub fn map(&self) -> Option<&TileMap> {
        self.map.as_ref()
    }

    pub fn generated(&self) -> Result<&TileMap, RunError> {
        self.map.as_ref().ok_or(RunError::NotGenerated)
    }

    pub fn tile_types(&self) -> Result<&Grid<usize>, RunError> {
        Ok(self.generated()?.tile_types())
    }

    pub fn rewards(&self) -> Result<&Grid<f64>, RunError> {
        Ok(self.generated()?.rewards())
    }

    fn exploration_rng(&self) -> StreamRng {
        stream_rng(self.config.exploration_seed)
    }

    /// An untrained pathfinder over the generated rewards.
    pub fn pathfinder(
        &self,
        start: Cell,
        goal: Cell,
        config: &PathfinderConfig,
    ) -> Result<QLearningPathfinder<StreamRng>, RunError> {
        let rewards = self.rewards()?;
        Ok(QLearningPathfinder::new(
            rewards,
            start,
            goal,
            config.clone(),
            self.exploration_rng(),
        )?)
    }

    pub fn run_pathfinding(
        &self,
        start: Cell,
        goal: Cell,
        config: &PathfinderConfig,
    ) -> Result<PathOutcome, RunError> {
        let mut finder = self.pathfinder(start, goal, config)?;
        let outcome = finder.run();
        info!(
            %start,
            %goal,
            succeeded = outcome.succeeded,
            len = outcome.path.len(),
            total_reward = outcome.total_reward,
            "q-learning run finished"
        );
        Ok(outcome)
    }

    pub fn run_random_walk(
        &self,
        start: Cell,
        goal: Cell,
        config: &RandomWalkConfig,
    ) -> Result<WalkOutcome, RunError> {
        let rewards = self.rewards()?;
        let mut rng = self.exploration_rng();
        let outcome = RandomWalk::new(rewards, config.clone()).walk(start, goal, &mut rng)?;
        info!(
            %start,
            %goal,
            reached = outcome.reached,
            steps = outcome.steps,
            total_reward = outcome.total_reward,
            "random walk finished"
        );
        Ok(outcome)
    }

    /// Q-learning between the configured endpoints.
    pub fn run(&self) -> Result<PathOutcome, RunError> {
        let c = &self.config;
        self.run_pathfinding(c.start, c.goal, &c.pathfinder)
    }

    /// Random walk between the configured endpoints.
    pub fn run_baseline(&self) -> Result<WalkOutcome, RunError> {
        let c = &self.config;
        self.run_random_walk(c.start, c.goal, &c.random_walk)
    }
}
