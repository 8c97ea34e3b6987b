//! Tabular Q-learning over grid cells.
//!
//! The value table holds one scalar per cell (the value of standing there),
//! not one per state-action pair. Training runs ε-greedy episodes from the
//! start cell; extraction follows the learned values greedily with a short
//! recent-cell window that swaps in a random step when the greedy step would
//! oscillate.
//!
//! ```no_run
//! use noisepath::grid::{Cell, Grid};
//! use noisepath::prng::stream_rng;
//! use noisepath::qlearning::{PathfinderConfig, QLearningPathfinder};
//!
//! let rewards = Grid::filled(8, 8, 0.0);
//! let mut finder = QLearningPathfinder::new(
//!     &rewards,
//!     Cell::new(0, 0),
//!     Cell::new(7, 7),
//!     PathfinderConfig::default(),
//!     stream_rng(1),
//! )
//! .unwrap();
//! let outcome = finder.run();
//! println!("{} cells, reached: {}", outcome.path.len(), outcome.succeeded);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashSet;
use rand::Rng;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{Cell, Connectivity, Grid, Offset};
use crate::stats::TrainingStats;

/// Length of the recent-cell window used by the oscillation breaker.
pub const OSCILLATION_WINDOW: usize = 4;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathfinderConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Probability of a uniformly random step during training. Constant.
    pub exploration_rate: f64,
    /// Training episodes.
    pub max_iterations: u32,
    pub max_steps_per_episode: u32,
    /// Extraction attempts. Zero skips extraction entirely.
    pub max_retries: u32,
    pub max_steps_for_pathfinding: u32,
    pub connectivity: Connectivity,
    /// Added to the goal cell of the pathfinder's private reward copy.
    pub goal_bonus: f64,
    /// Weight of `distance(next, goal)` subtracted from the training reward.
    pub distance_penalty_weight: f64,
    /// Weight of `distance(next, goal)` in the training-time greedy choice.
    pub heuristic_weight: f64,
    /// Charged when the greedy step is replaced because it would revisit.
    pub greedy_revisit_penalty: f64,
    /// Charged when the next cell was already visited this episode.
    pub revisit_penalty: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.2,
            max_iterations: 1000,
            max_steps_per_episode: 500,
            max_retries: 3,
            max_steps_for_pathfinding: 1000,
            connectivity: Connectivity::Eight,
            goal_bonus: 10.0,
            distance_penalty_weight: 0.1,
            heuristic_weight: 0.1,
            greedy_revisit_penalty: 0.5,
            revisit_penalty: 0.1,
        }
    }
}

impl PathfinderConfig {
    pub fn with_rates(mut self, learning_rate: f64, discount_factor: f64, exploration_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self.discount_factor = discount_factor;
        self.exploration_rate = exploration_rate;
        self
    }

    pub fn with_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_goal_bonus(mut self, goal_bonus: f64) -> Self {
        self.goal_bonus = goal_bonus;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("learning_rate", self.learning_rate),
            ("discount_factor", self.discount_factor),
            ("exploration_rate", self.exploration_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        for (name, value) in [
            ("goal_bonus", self.goal_bonus),
            ("distance_penalty_weight", self.distance_penalty_weight),
            ("heuristic_weight", self.heuristic_weight),
            ("greedy_revisit_penalty", self.greedy_revisit_penalty),
            ("revisit_penalty", self.revisit_penalty),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }
        Ok(())
    }
}

/// Result of path extraction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathOutcome {
    /// Start to goal on success; the last failed attempt otherwise, which may
    /// be partial or empty.
    pub path: Vec<Cell>,
    pub succeeded: bool,
    /// Sum of the (goal-boosted) rewards along `path`.
    pub total_reward: f64,
    /// Extraction attempts made.
    pub attempts: u32,
}

pub struct QLearningPathfinder<R: Rng> {
    config: PathfinderConfig,
    rewards: Grid<f64>,
    q: Grid<f64>,
    blocked: Option<Grid<bool>>,
    start: Cell,
    goal: Cell,
    rng: R,
    stats: TrainingStats,
}

impl<R: Rng> QLearningPathfinder<R> {
    /// Copies `rewards` and adds `goal_bonus` to the goal cell of the copy.
    pub fn new(
        rewards: &Grid<f64>,
        start: Cell,
        goal: Cell,
        config: PathfinderConfig,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        for (what, cell) in [("start", start), ("goal", goal)] {
            if !rewards.contains(cell) {
                return Err(ConfigError::CellOutOfBounds {
                    what,
                    cell,
                    height: rewards.height(),
                    width: rewards.width(),
                });
            }
        }

        let mut rewards = rewards.clone();
        rewards[goal] += config.goal_bonus;
        let q = Grid::filled(rewards.height(), rewards.width(), 0.0);

        Ok(Self {
            config,
            rewards,
            q,
            blocked: None,
            start,
            goal,
            rng,
            stats: TrainingStats::new(),
        })
    }

    /// Cells set to `true` are treated like out-of-bounds cells.
    pub fn with_blocked(mut self, blocked: Grid<bool>) -> Result<Self, ConfigError> {
        if !blocked.same_shape(&self.rewards) {
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

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    pub fn q_values(&self) -> &Grid<f64> {
        &self.q
    }

    /// The private reward copy, goal bonus included.
    pub fn rewards(&self) -> &Grid<f64> {
        &self.rewards
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    #[inline]
    pub fn is_valid(&self, cell: Cell) -> bool {
        match &self.blocked {
            Some(mask) => matches!(mask.get(cell), Some(false)),
            None => self.rewards.contains(cell),
        }
    }

    fn random_direction(&mut self) -> Offset {
        let offsets = self.config.connectivity.offsets();
        offsets[self.rng.gen_range(0..offsets.len())]
    }

    /// Training-time greedy step: maximizes `Q[next] - heuristic_weight *
    /// distance(next, goal)` over valid neighbors, first in order on ties.
    pub fn best_action(&self, cell: Cell) -> Option<Offset> {
        let weight = self.config.heuristic_weight;
        self.argmax_neighbor(cell, |next| {
            self.q[next] - weight * next.distance(self.goal)
        })
    }

    /// Extraction-time greedy step: plain `argmax Q[next]`.
    pub fn greedy_neighbor(&self, cell: Cell) -> Option<Offset> {
        self.argmax_neighbor(cell, |next| self.q[next])
    }

    fn argmax_neighbor(&self, cell: Cell, score: impl Fn(Cell) -> f64) -> Option<Offset> {
        let mut best: Option<(Offset, f64)> = None;
        for &dir in self.config.connectivity.offsets() {
            let next = cell.offset(dir);
            if !self.is_valid(next) {
                continue;
            }
            let s = score(next);
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((dir, s));
            }
        }
        best.map(|(dir, _)| dir)
    }

    /// Highest Q among valid neighbors of `cell`, or `0.0` if none is valid.
    pub fn max_neighbor_q(&self, cell: Cell) -> f64 {
        self.config
            .connectivity
            .offsets()
            .iter()
            .map(|&dir| cell.offset(dir))
            .filter(|&next| self.is_valid(next))
            .map(|next| self.q[next])
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    pub fn train(&mut self) -> &TrainingStats {
        self.train_with_cancel(&AtomicBool::new(false))
    }

    /// Runs up to `max_iterations` episodes, checking `cancel` before each.
    /// Values learned before cancellation are kept.
    pub fn train_with_cancel(&mut self, cancel: &AtomicBool) -> &TrainingStats {
        let mut visited = HashSet::new();
        for episode in 0..self.config.max_iterations {
            if cancel.load(Ordering::Relaxed) {
                self.stats.cancelled = true;
                warn!(episode, "training cancelled");
                break;
            }
            let (reached, steps) = self.run_episode(&mut visited);

            let before = (
                self.stats.learning_at_episode,
                self.stats.learned_at_episode,
                self.stats.mastered_at_episode,
            );
            self.stats.record_episode(reached, steps);
            let after = (
                self.stats.learning_at_episode,
                self.stats.learned_at_episode,
                self.stats.mastered_at_episode,
            );
            if before != after {
                debug!(
                    episode = self.stats.episodes,
                    rate = self.stats.last_100_rate(),
                    "training milestone"
                );
            }
        }

        info!(
            episodes = self.stats.episodes,
            goal_rate = self.stats.goal_rate(),
            mean_steps = self.stats.mean_steps(),
            "training finished"
        );
        &self.stats
    }

    fn run_episode(&mut self, visited: &mut HashSet<Cell>) -> (bool, u32) {
        visited.clear();
        let mut current = self.start;
        let mut steps = 0;

        while current != self.goal && steps < self.config.max_steps_per_episode {
            steps += 1;
            visited.insert(current);
            let mut reward = 0.0;

            let action = if self.rng.gen::<f64>() < self.config.exploration_rate {
                self.random_direction()
            } else {
                match self.best_action(current) {
                    Some(dir) if !visited.contains(&current.offset(dir)) => dir,
                    // No valid neighbor counts as staying put, which is a revisit.
                    _ => {
                        reward -= self.config.greedy_revisit_penalty;
                        self.random_direction()
                    }
                }
            };

            let next = current.offset(action);
            if !self.is_valid(next) {
                continue;
            }

            reward += self.rewards[next]
                - self.config.distance_penalty_weight * next.distance(self.goal);
            if visited.contains(&next) {
                reward -= self.config.revisit_penalty;
            }

            let future = self.max_neighbor_q(next);
            let (alpha, gamma) = (self.config.learning_rate, self.config.discount_factor);
            let q = &mut self.q[current];
            *q += alpha * (reward + gamma * future - *q);

            current = next;
        }

        (current == self.goal, steps)
    }

    /// One greedy walk from start. Returns the path and whether it reached
    /// the goal; an invalid step yields an empty path.
    pub fn attempt_path(&mut self) -> (Vec<Cell>, bool) {
        let mut path = Vec::new();
        let mut recent: VecDeque<Cell> = VecDeque::with_capacity(OSCILLATION_WINDOW);
        let mut current = self.start;
        let mut steps = 0;

        while current != self.goal {
            if steps >= self.config.max_steps_for_pathfinding {
                debug!(steps, "step limit reached during extraction");
                return (path, false);
            }
            steps += 1;

            if recent.len() == OSCILLATION_WINDOW {
                recent.pop_front();
            }
            recent.push_back(current);
            path.push(current);

            let next = match self.greedy_neighbor(current) {
                Some(dir) if !recent.contains(&current.offset(dir)) => current.offset(dir),
                _ => current.offset(self.random_direction()),
            };

            if !self.is_valid(next) {
                debug!(%current, %next, "extraction stepped onto an invalid cell");
                return (Vec::new(), false);
            }
            current = next;
        }

        path.push(self.goal);
        (path, true)
    }

    /// Up to `max_retries` extraction attempts; the first success wins,
    /// otherwise the last failed attempt is returned.
    pub fn extract_path(&mut self) -> PathOutcome {
        let mut last_failed = Vec::new();

        for attempt in 1..=self.config.max_retries {
            let (path, reached) = self.attempt_path();
            if reached {
                let total_reward = self.path_reward(&path);
                info!(attempt, len = path.len(), total_reward, "path found");
                return PathOutcome {
                    path,
                    succeeded: true,
                    total_reward,
                    attempts: attempt,
                };
            }
            warn!(attempt, len = path.len(), "extraction attempt failed");
            last_failed = path;
        }

        let total_reward = self.path_reward(&last_failed);
        warn!(
            retries = self.config.max_retries,
            total_reward, "pathfinding failed after maximum retries"
        );
        PathOutcome {
            path: last_failed,
            succeeded: false,
            total_reward,
            attempts: self.config.max_retries,
        }
    }

    /// Train, then extract.
    pub fn run(&mut self) -> PathOutcome {
        self.train();
        self.extract_path()
    }

    pub fn path_reward(&self, path: &[Cell]) -> f64 {
        path.iter().filter_map(|&c| self.rewards.get(c)).sum()
    }

    pub fn into_q_values(self) -> Grid<f64> {
        self.q
    }
}

/// Build, train and extract in one call.
pub fn run_pathfinding<R: Rng>(
    rewards: &Grid<f64>,
    start: Cell,
    goal: Cell,
    config: PathfinderConfig,
    rng: R,
) -> Result<PathOutcome, ConfigError> {
    let mut finder = QLearningPathfinder::new(rewards, start, goal, config, rng)?;
    Ok(finder.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::stream_rng;
    use rand::Rng as _;

    fn corridor_config() -> PathfinderConfig {
        PathfinderConfig::default()
            .with_rates(0.5, 0.9, 0.1)
            .with_iterations(500)
            .with_retries(10)
            .with_connectivity(Connectivity::Four)
            .with_goal_bonus(0.0)
    }

    fn five_by_five() -> Grid<f64> {
        let mut rewards = Grid::filled(5, 5, 0.0);
        rewards[Cell::new(4, 4)] = 10.0;
        rewards
    }

    fn assert_contiguous(path: &[Cell], connectivity: Connectivity) {
        for pair in path.windows(2) {
            let step = Offset::new(pair[1].row - pair[0].row, pair[1].col - pair[0].col);
            assert!(
                connectivity.offsets().contains(&step),
                "{} -> {} is not a legal step",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn defaults_validate() {
        assert_eq!(PathfinderConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rates_outside_unit_interval_are_rejected() {
        let config = PathfinderConfig::default().with_rates(1.5, 0.9, 0.2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitRange {
                name: "learning_rate",
                ..
            })
        ));
    }

    #[test]
    fn out_of_bounds_goal_is_rejected() {
        let rewards = Grid::filled(3, 3, 0.0);
        let result = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            Cell::new(3, 0),
            PathfinderConfig::default(),
            stream_rng(0),
        );
        assert!(matches!(
            result,
            Err(ConfigError::CellOutOfBounds { what: "goal", .. })
        ));
    }

    #[test]
    fn goal_bonus_touches_only_private_copy() {
        let rewards = Grid::filled(3, 3, 1.0);
        let goal = Cell::new(2, 2);
        let finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            goal,
            PathfinderConfig::default(),
            stream_rng(0),
        )
        .unwrap();
        assert_eq!(finder.rewards()[goal], 11.0);
        assert_eq!(rewards[goal], 1.0);
    }

    #[test]
    fn start_equal_to_goal_is_a_single_cell_path() {
        let rewards = Grid::filled(1, 1, 2.0);
        let cell = Cell::new(0, 0);
        let outcome = run_pathfinding(
            &rewards,
            cell,
            cell,
            PathfinderConfig::default(),
            stream_rng(1),
        )
        .unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.path, vec![cell]);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.total_reward, 12.0);
    }

    #[test]
    fn zero_retries_returns_empty_failure() {
        let outcome = run_pathfinding(
            &five_by_five(),
            Cell::new(0, 0),
            Cell::new(4, 4),
            corridor_config().with_retries(0),
            stream_rng(2),
        )
        .unwrap();
        assert!(!outcome.succeeded);
        assert!(outcome.path.is_empty());
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.total_reward, 0.0);
    }

    #[test]
    fn learns_path_across_small_grid() {
        for seed in 0..5 {
            let outcome = run_pathfinding(
                &five_by_five(),
                Cell::new(0, 0),
                Cell::new(4, 4),
                corridor_config(),
                stream_rng(seed),
            )
            .unwrap();
            assert!(outcome.succeeded, "seed {seed}");
            assert_eq!(outcome.path.first(), Some(&Cell::new(0, 0)));
            assert_eq!(outcome.path.last(), Some(&Cell::new(4, 4)));
            assert!(outcome.path.len() >= 9);
            assert_contiguous(&outcome.path, Connectivity::Four);
        }
    }

    #[test]
    fn same_seed_same_outcome() {
        let run = |seed| {
            let mut finder = QLearningPathfinder::new(
                &five_by_five(),
                Cell::new(0, 0),
                Cell::new(4, 4),
                corridor_config(),
                stream_rng(seed),
            )
            .unwrap();
            let outcome = finder.run();
            (outcome, finder.into_q_values())
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn q_values_stay_bounded() {
        let mut rng = stream_rng(99);
        let cells: Vec<f64> = (0..64).map(|_| rng.gen_range(-3.0..3.0)).collect();
        let rewards = Grid::from_vec(8, 8, cells).unwrap();
        let config = PathfinderConfig::default().with_iterations(200);
        let mut finder =
            QLearningPathfinder::new(&rewards, Cell::new(0, 0), Cell::new(7, 7), config.clone(), stream_rng(5))
                .unwrap();
        finder.train();

        let max_reward = finder
            .rewards()
            .as_slice()
            .iter()
            .fold(0.0f64, |m, r| m.max(r.abs()));
        let max_dist = Cell::new(0, 0).distance(Cell::new(7, 7));
        let per_step = max_reward
            + config.distance_penalty_weight * max_dist
            + config.greedy_revisit_penalty
            + config.revisit_penalty;
        let bound = per_step / (1.0 - config.discount_factor) + 1e-9;
        for &q in finder.q_values().as_slice() {
            assert!(q.is_finite());
            assert!(q.abs() <= bound, "{q} exceeds {bound}");
        }
    }

    #[test]
    fn max_neighbor_q_without_valid_neighbors_is_zero() {
        let rewards = Grid::filled(1, 1, 0.0);
        let finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            Cell::new(0, 0),
            PathfinderConfig::default(),
            stream_rng(0),
        )
        .unwrap();
        assert_eq!(finder.max_neighbor_q(Cell::new(0, 0)), 0.0);
        assert_eq!(finder.greedy_neighbor(Cell::new(0, 0)), None);
    }

    #[test]
    fn greedy_ties_pick_first_direction() {
        let rewards = Grid::filled(3, 3, 0.0);
        let finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(1, 1),
            Cell::new(2, 2),
            PathfinderConfig::default(),
            stream_rng(0),
        )
        .unwrap();
        // All Q are zero: the first listed direction wins.
        assert_eq!(finder.greedy_neighbor(Cell::new(1, 1)), Some(Offset::new(0, 1)));
        // The heuristic prefers the diagonal toward the goal.
        assert_eq!(finder.best_action(Cell::new(1, 1)), Some(Offset::new(1, 1)));
    }

    #[test]
    fn walled_goal_is_never_reached() {
        let rewards = Grid::filled(5, 5, 0.0);
        let goal = Cell::new(4, 4);
        let mut blocked = Grid::filled(5, 5, false);
        for cell in [Cell::new(3, 3), Cell::new(3, 4), Cell::new(4, 3)] {
            blocked[cell] = true;
        }
        let mut finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            goal,
            PathfinderConfig::default().with_iterations(50).with_retries(2),
            stream_rng(3),
        )
        .unwrap()
        .with_blocked(blocked)
        .unwrap();
        let outcome = finder.run();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.attempts, 2);
        assert!(!outcome.path.contains(&goal));
        assert_eq!(finder.stats().goal_reached, 0);
    }

    #[test]
    fn blocked_mask_must_match_shape() {
        let rewards = Grid::filled(4, 4, 0.0);
        let finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            Cell::new(3, 3),
            PathfinderConfig::default(),
            stream_rng(0),
        )
        .unwrap();
        assert!(matches!(
            finder.with_blocked(Grid::filled(4, 5, false)),
            Err(ConfigError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn cancelled_training_stops_before_first_episode() {
        let mut finder = QLearningPathfinder::new(
            &five_by_five(),
            Cell::new(0, 0),
            Cell::new(4, 4),
            corridor_config(),
            stream_rng(0),
        )
        .unwrap();
        let stats = finder.train_with_cancel(&AtomicBool::new(true));
        assert_eq!(stats.episodes, 0);
        assert!(stats.cancelled);
        assert!(finder.q_values().as_slice().iter().all(|&q| q == 0.0));
    }

    #[test]
    fn training_records_every_episode() {
        let mut finder = QLearningPathfinder::new(
            &five_by_five(),
            Cell::new(0, 0),
            Cell::new(4, 4),
            corridor_config(),
            stream_rng(11),
        )
        .unwrap();
        let stats = finder.train();
        assert_eq!(stats.episodes, 500);
        assert!(stats.goal_reached > 0);
    }
}
