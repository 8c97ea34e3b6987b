use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::map::{MapConfig, TileMap};
use crate::qlearning::QLearningPathfinder;
use crate::stats::TrainingStats;

/// A read-only snapshot of a generated map for a presentation layer.
///
/// Design intent:
/// - Observers cannot mutate the map; snapshots are owned copies.
/// - Tile codes are resolved to names so a renderer can pick visuals
///   without knowing the tileset layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapSnapshot {
    pub height: usize,
    pub width: usize,
    pub tile_types: Vec<Vec<usize>>,
    pub rewards: Vec<Vec<f64>>,
    /// Name per tile code: base tiles first, then obstacles.
    pub legend: Vec<String>,
    pub road_cells: usize,
}

pub struct MapAdapter<'a> {
    map: &'a TileMap,
    config: &'a MapConfig,
}

impl<'a> MapAdapter<'a> {
    pub fn new(map: &'a TileMap, config: &'a MapConfig) -> Self {
        Self { map, config }
    }

    pub fn snapshot(&self) -> MapSnapshot {
        let legend = self
            .config
            .tiles
            .iter()
            .map(|t| t.name.clone())
            .chain(self.config.obstacle_defs.iter().map(|o| o.name.clone()))
            .collect();

        MapSnapshot {
            height: self.map.height(),
            width: self.map.width(),
            tile_types: self.map.tile_types().to_nested(),
            rewards: self.map.rewards().to_nested(),
            legend,
            road_cells: self.map.road_cells().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathfinderSnapshot {
    pub start: Cell,
    pub goal: Cell,
    pub q_values: Vec<Vec<f64>>,
    pub min_q: f64,
    pub max_q: f64,
    pub stats: TrainingStats,
}

pub struct PathfinderAdapter<'a, R: Rng> {
    finder: &'a QLearningPathfinder<R>,
}

impl<'a, R: Rng> PathfinderAdapter<'a, R> {
    pub fn new(finder: &'a QLearningPathfinder<R>) -> Self {
        Self { finder }
    }

    pub fn snapshot(&self) -> PathfinderSnapshot {
        let q = self.finder.q_values();
        let (min_q, max_q) = q
            .as_slice()
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        PathfinderSnapshot {
            start: self.finder.start(),
            goal: self.finder.goal(),
            q_values: q.to_nested(),
            min_q,
            max_q,
            stats: self.finder.stats().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::map::{MapComposer, ObstacleConfig};
    use crate::prng::stream_rng;
    use crate::qlearning::PathfinderConfig;

    #[test]
    fn map_snapshot_mirrors_map() {
        let config = MapConfig::new(6, 4).with_obstacles(ObstacleConfig::disabled());
        let map = MapComposer::new(config.clone()).unwrap().generate().unwrap();
        let snap = MapAdapter::new(&map, &config).snapshot();
        assert_eq!(snap.tile_types.len(), 6);
        assert!(snap.tile_types.iter().all(|row| row.len() == 4));
        assert_eq!(snap.legend.len(), config.tiles.len() + config.obstacle_defs.len());
        assert_eq!(snap.legend[0], "deep_water");
        assert_eq!(snap.rewards[2][3], map.rewards()[Cell::new(2, 3)]);
    }

    #[test]
    fn pathfinder_snapshot_tracks_training() {
        let rewards = Grid::filled(4, 4, 0.0);
        let mut finder = QLearningPathfinder::new(
            &rewards,
            Cell::new(0, 0),
            Cell::new(3, 3),
            PathfinderConfig::default().with_iterations(30),
            stream_rng(2),
        )
        .unwrap();
        finder.train();
        let snap = PathfinderAdapter::new(&finder).snapshot();
        assert_eq!(snap.stats.episodes, 30);
        assert_eq!(snap.goal, Cell::new(3, 3));
        assert!(snap.min_q <= snap.max_q);
        assert_eq!(snap.q_values[1][2], finder.q_values()[Cell::new(1, 2)]);
    }
}
