use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const RECENT_WINDOW: usize = 200;
const RATE_WINDOW: usize = 100;
const MIN_EPISODES_FOR_MILESTONE: u32 = 20;

/// Per-episode outcome counters for a training run.
///
/// Milestones record the first episode at which the goal rate over the last
/// 100 episodes reached 0.70 (`learning`), 0.85 (`learned`) and 0.95
/// (`mastered`). They are not recorded before 20 episodes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingStats {
    pub episodes: u32,
    pub goal_reached: u32,
    pub total_steps: u64,
    /// Fewest steps taken by a goal-reaching episode.
    pub best_steps: Option<u32>,
    pub recent: VecDeque<bool>,
    pub learning_at_episode: Option<u32>,
    pub learned_at_episode: Option<u32>,
    pub mastered_at_episode: Option<u32>,
    pub cancelled: bool,
}

impl TrainingStats {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(RECENT_WINDOW),
            ..Self::default()
        }
    }

    pub fn record_episode(&mut self, reached_goal: bool, steps: u32) {
        self.episodes += 1;
        self.total_steps += u64::from(steps);
        if reached_goal {
            self.goal_reached += 1;
            self.best_steps = Some(self.best_steps.map_or(steps, |b| b.min(steps)));
        }

        self.recent.push_back(reached_goal);
        if self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.update_milestones();
    }

    fn update_milestones(&mut self) {
        if self.episodes < MIN_EPISODES_FOR_MILESTONE {
            return;
        }
        let r = self.last_100_rate();
        let episode = self.episodes;
        if self.learning_at_episode.is_none() && r >= 0.70 {
            self.learning_at_episode = Some(episode);
        }
        if self.learned_at_episode.is_none() && r >= 0.85 {
            self.learned_at_episode = Some(episode);
        }
        if self.mastered_at_episode.is_none() && r >= 0.95 {
            self.mastered_at_episode = Some(episode);
        }
    }

    pub fn goal_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            f64::from(self.goal_reached) / f64::from(self.episodes)
        }
    }

    pub fn recent_rate(&self) -> f64 {
        rate(self.recent.iter())
    }

    pub fn last_100_rate(&self) -> f64 {
        let skip = self.recent.len().saturating_sub(RATE_WINDOW);
        rate(self.recent.iter().skip(skip))
    }

    pub fn mean_steps(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_steps as f64 / f64::from(self.episodes)
        }
    }
}

fn rate<'a>(outcomes: impl Iterator<Item = &'a bool>) -> f64 {
    let (hits, total) = outcomes.fold((0usize, 0usize), |(h, t), &ok| (h + usize::from(ok), t + 1));
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_report_zero() {
        let s = TrainingStats::new();
        assert_eq!(s.goal_rate(), 0.0);
        assert_eq!(s.last_100_rate(), 0.0);
        assert_eq!(s.mean_steps(), 0.0);
        assert_eq!(s.best_steps, None);
    }

    #[test]
    fn counts_and_best_steps() {
        let mut s = TrainingStats::new();
        s.record_episode(false, 500);
        s.record_episode(true, 40);
        s.record_episode(true, 12);
        assert_eq!(s.episodes, 3);
        assert_eq!(s.goal_reached, 2);
        assert_eq!(s.total_steps, 552);
        assert_eq!(s.best_steps, Some(12));
        assert!((s.goal_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn milestones_wait_for_minimum_episodes() {
        let mut s = TrainingStats::new();
        for _ in 0..19 {
            s.record_episode(true, 1);
        }
        assert_eq!(s.mastered_at_episode, None);
        s.record_episode(true, 1);
        assert_eq!(s.learning_at_episode, Some(20));
        assert_eq!(s.learned_at_episode, Some(20));
        assert_eq!(s.mastered_at_episode, Some(20));
    }

    #[test]
    fn recent_window_is_bounded() {
        let mut s = TrainingStats::new();
        for i in 0..450 {
            s.record_episode(i % 2 == 0, 3);
        }
        assert_eq!(s.recent.len(), 200);
        assert!((s.last_100_rate() - 0.5).abs() < 1e-12);
        assert_eq!(s.learning_at_episode, None);
    }
}
