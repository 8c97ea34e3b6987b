#[cfg(feature = "serde")]
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigError;
use crate::grid::Cell;
use crate::map::MapConfig;
use crate::prng::SeedSet;
use crate::qlearning::PathfinderConfig;
use crate::random_walk::RandomWalkConfig;

/// Everything a host needs for one generate → train → extract run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    pub map: MapConfig,
    pub start: Cell,
    pub goal: Cell,
    /// Seed of the exploration stream shared by both pathfinders.
    pub exploration_seed: u64,
    pub pathfinder: PathfinderConfig,
    pub random_walk: RandomWalkConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        let map = MapConfig::default();
        let goal = Cell::new(map.height as i32 - 1, map.width as i32 - 1);
        Self {
            map,
            start: Cell::new(0, 0),
            goal,
            exploration_seed: 100,
            pathfinder: PathfinderConfig::default(),
            random_walk: RandomWalkConfig::default(),
        }
    }
}

impl RunConfig {
    /// Derive noise, obstacle and exploration seeds from one number.
    pub fn with_master_seed(mut self, master: u64) -> Self {
        let seeds = SeedSet::from_master(master);
        self.map.seed = seeds.noise;
        self.map.obstacles.seed = seeds.obstacles;
        self.exploration_seed = seeds.exploration;
        self
    }

    pub fn with_endpoints(mut self, start: Cell, goal: Cell) -> Self {
        self.start = start;
        self.goal = goal;
        self
    }

    pub fn seeds(&self) -> SeedSet {
        SeedSet {
            noise: self.map.seed,
            obstacles: self.map.obstacles.seed,
            exploration: self.exploration_seed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.map.validate()?;
        self.pathfinder.validate()?;
        let (height, width) = (self.map.height, self.map.width);
        for (what, cell) in [("start", self.start), ("goal", self.goal)] {
            let inside = cell.row >= 0
                && cell.col >= 0
                && (cell.row as usize) < height
                && (cell.col as usize) < width;
            if !inside {
                return Err(ConfigError::CellOutOfBounds {
                    what,
                    cell,
                    height,
                    width,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

#[cfg(feature = "serde")]
impl RunConfig {
    /// Read JSON; missing fields take their defaults. The result is validated.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(RunConfig::default().validate(), Ok(()));
    }

    #[test]
    fn endpoints_outside_map_are_rejected() {
        let config = RunConfig::default().with_endpoints(Cell::new(0, 0), Cell::new(50, 0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CellOutOfBounds { what: "goal", .. })
        ));
    }

    #[test]
    fn master_seed_fills_every_stream() {
        let config = RunConfig::default().with_master_seed(42);
        assert_eq!(config.seeds(), SeedSet::from_master(42));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_takes_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "map": { "height": 12, "width": 9 }, "goal": { "row": 11, "col": 8 } }"#)
                .unwrap();
        assert_eq!(config.map.height, 12);
        assert_eq!(config.map.width, 9);
        assert_eq!(config.map.tiles, MapConfig::default().tiles);
        assert_eq!(config.pathfinder, PathfinderConfig::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("noisepath-config-{}", std::process::id()));
        let path = dir.join("run.json");
        let config = RunConfig::default().with_master_seed(7);
        config.save_to_file(&path).unwrap();
        let loaded = RunConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn invalid_file_contents_are_reported() {
        let dir = std::env::temp_dir().join(format!("noisepath-invalid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{ "map": { "height": 0 } }"#).unwrap();
        assert!(matches!(
            RunConfig::load_from_file(&path),
            Err(ConfigFileError::Invalid(ConfigError::ZeroDimension { .. }))
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RunConfig::load_from_file(&path),
            Err(ConfigFileError::Parse(_))
        ));
        let _ = std::fs::remove_dir_all(dir);
    }
}
