use rand::Rng;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{Cell, Connectivity, Grid};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RandomWalkConfig {
    pub max_steps: u32,
    pub connectivity: Connectivity,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            connectivity: Connectivity::Eight,
        }
    }
}

impl RandomWalkConfig {
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WalkOutcome {
    /// Start cell followed by every cell actually moved to.
    pub path: Vec<Cell>,
    /// Rewards of every cell in `path`, start included.
    pub total_reward: f64,
    pub reached: bool,
    /// Steps consumed, including rejected moves.
    pub steps: u32,
}

/// Non-learning baseline: uniformly random steps until the goal or the step
/// budget. Invalid moves leave the walker in place but still cost a step.
#[derive(Debug, Clone)]
pub struct RandomWalk<'a> {
    rewards: &'a Grid<f64>,
    blocked: Option<&'a Grid<bool>>,
    config: RandomWalkConfig,
}

impl<'a> RandomWalk<'a> {
    pub fn new(rewards: &'a Grid<f64>, config: RandomWalkConfig) -> Self {
        Self {
            rewards,
            blocked: None,
            config,
        }
    }

    pub fn with_blocked(mut self, blocked: &'a Grid<bool>) -> Result<Self, ConfigError> {
        if !blocked.same_shape(self.rewards) {
            return Err(ConfigError::DimensionMismatch {
                what: "blocked mask",
                height: self.rewards.height(),
                width: self.rewards.width(),
                actual_height: blocked.height(),
                actual_width: blocked.width(),
            });
        }
        self.blocked = Some(blocked);
        Ok(self)
    }

    fn is_valid(&self, cell: Cell) -> bool {
        match self.blocked {
            Some(mask) => matches!(mask.get(cell), Some(false)),
            None => self.rewards.contains(cell),
        }
    }

    pub fn walk<R: Rng + ?Sized>(
        &self,
        start: Cell,
        goal: Cell,
        rng: &mut R,
    ) -> Result<WalkOutcome, ConfigError> {
        for (what, cell) in [("start", start), ("goal", goal)] {
            if !self.rewards.contains(cell) {
                return Err(ConfigError::CellOutOfBounds {
                    what,
                    cell,
                    height: self.rewards.height(),
                    width: self.rewards.width(),
                });
            }
        }

        let offsets = self.config.connectivity.offsets();
        let mut current = start;
        let mut path = vec![start];
        let mut total_reward = self.rewards[start];
        let mut steps = 0;

        while steps < self.config.max_steps && current != goal {
            steps += 1;
            let next = current.offset(offsets[rng.gen_range(0..offsets.len())]);
            if self.is_valid(next) {
                current = next;
                path.push(current);
                total_reward += self.rewards[current];
            }
        }

        let reached = current == goal;
        debug!(steps, reached, total_reward, "random walk finished");
        Ok(WalkOutcome {
            path,
            total_reward,
            reached,
            steps,
        })
    }
}

pub fn run_random_walk<R: Rng + ?Sized>(
    rewards: &Grid<f64>,
    start: Cell,
    goal: Cell,
    config: RandomWalkConfig,
    rng: &mut R,
) -> Result<WalkOutcome, ConfigError> {
    RandomWalk::new(rewards, config).walk(start, goal, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::stream_rng;

    #[test]
    fn same_seed_same_walk() {
        let rewards = Grid::filled(10, 10, 0.5);
        let walker = RandomWalk::new(&rewards, RandomWalkConfig::default());
        let a = walker
            .walk(Cell::new(0, 0), Cell::new(9, 9), &mut stream_rng(4))
            .unwrap();
        let b = walker
            .walk(Cell::new(0, 0), Cell::new(9, 9), &mut stream_rng(4))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn path_starts_at_start_and_moves_one_step_at_a_time() {
        let rewards = Grid::filled(6, 6, 1.0);
        let outcome = run_random_walk(
            &rewards,
            Cell::new(2, 2),
            Cell::new(5, 5),
            RandomWalkConfig::default().with_max_steps(200),
            &mut stream_rng(8),
        )
        .unwrap();
        assert_eq!(outcome.path[0], Cell::new(2, 2));
        assert!(outcome.steps <= 200);
        assert!(outcome.path.len() as u32 <= outcome.steps + 1);
        for pair in outcome.path.windows(2) {
            assert!(pair[0].row.abs_diff(pair[1].row) <= 1);
            assert!(pair[0].col.abs_diff(pair[1].col) <= 1);
            assert_ne!(pair[0], pair[1]);
        }
        // Every cell is worth 1, start included.
        assert_eq!(outcome.total_reward, outcome.path.len() as f64);
        assert_eq!(outcome.reached, outcome.path.last() == Some(&Cell::new(5, 5)));
    }

    #[test]
    fn start_at_goal_takes_no_steps() {
        let rewards = Grid::filled(3, 3, -2.0);
        let outcome = run_random_walk(
            &rewards,
            Cell::new(1, 1),
            Cell::new(1, 1),
            RandomWalkConfig::default(),
            &mut stream_rng(0),
        )
        .unwrap();
        assert!(outcome.reached);
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.path, vec![Cell::new(1, 1)]);
        assert_eq!(outcome.total_reward, -2.0);
    }

    #[test]
    fn blocked_neighbors_burn_steps_in_place() {
        let mut other = Grid::filled(1, 2, 0.0);
        other[Cell::new(0, 1)] = 1.0;
        let stuck = RandomWalk::new(&other, RandomWalkConfig::default().with_max_steps(25));
        let mask = Grid::from_vec(1, 2, vec![false, true]).unwrap();
        let stuck = stuck.with_blocked(&mask).unwrap();
        let outcome = stuck
            .walk(Cell::new(0, 0), Cell::new(0, 1), &mut stream_rng(1))
            .unwrap();
        assert!(!outcome.reached);
        assert_eq!(outcome.steps, 25);
        assert_eq!(outcome.path, vec![Cell::new(0, 0)]);
    }

    #[test]
    fn out_of_bounds_start_is_rejected() {
        let rewards = Grid::filled(2, 2, 0.0);
        let err = run_random_walk(
            &rewards,
            Cell::new(-1, 0),
            Cell::new(1, 1),
            RandomWalkConfig::default(),
            &mut stream_rng(0),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::CellOutOfBounds { what: "start", .. }));
    }
}
