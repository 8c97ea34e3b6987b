//! Tile map synthesis: noise classification followed by obstacle overlays.
//!
//! Generation runs in two phases with independent random streams:
//!
//! 1. Every cell is classified with [`NoiseField::tile_type_at`] and given the
//!    reward of its tile definition.
//! 2. Roads are walked between sampled end points (bridges where a road is not
//!    eligible), then buildings are stamped next to the road network.
//!
//! Obstacle roles are positional in [`MapConfig::obstacle_defs`]:
//! index 0 is the road, 1 the bridge, 2 the building.

use core::fmt::Write as _;

use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MapError};
use crate::grid::{Cell, Grid, Offset};
use crate::noise_field::{NoiseConfig, NoiseField};
use crate::prng;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileDefinition {
    pub name: String,
    pub reward: f64,
}

impl TileDefinition {
    pub fn new(name: impl Into<String>, reward: f64) -> Self {
        Self {
            name: name.into(),
            reward,
        }
    }
}

/// Inclusive range of tile-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileRange {
    pub min: usize,
    pub max: usize,
}

impl TileRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, tile_type: usize) -> bool {
        tile_type >= self.min && tile_type <= self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObstacleDefinition {
    pub name: String,
    /// Added to the cell's reward on every placement.
    pub reward_modifier: f64,
    pub eligible_tiles: TileRange,
}

impl ObstacleDefinition {
    pub fn new(name: impl Into<String>, reward_modifier: f64, eligible_tiles: TileRange) -> Self {
        Self {
            name: name.into(),
            reward_modifier,
            eligible_tiles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ObstacleKind {
    Road,
    Bridge,
    Building,
}

impl ObstacleKind {
    pub const fn index(self) -> usize {
        match self {
            ObstacleKind::Road => 0,
            ObstacleKind::Bridge => 1,
            ObstacleKind::Building => 2,
        }
    }

    pub const fn role(self) -> &'static str {
        match self {
            ObstacleKind::Road => "road",
            ObstacleKind::Bridge => "bridge",
            ObstacleKind::Building => "building",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ObstacleConfig {
    pub enabled: bool,
    /// Seed of the obstacle stream, independent of the noise seed.
    pub seed: u64,
    pub number_of_roads: u32,
    /// Euclidean distance band between a road's start and end.
    pub road_min_range: f64,
    pub road_max_range: f64,
    pub number_of_buildings: u32,
    /// Building anchor offset from a road cell, per axis, inclusive.
    pub building_offset_min: i32,
    pub building_offset_max: i32,
    /// Building half-size; the footprint is `(2 * size + 1)^2`.
    pub building_size_min: i32,
    pub building_size_max: i32,
    /// Bound on samples for a single start, end or anchor search.
    pub max_placement_attempts: u32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 100,
            number_of_roads: 5,
            road_min_range: 10.0,
            road_max_range: 20.0,
            number_of_buildings: 10,
            building_offset_min: 1,
            building_offset_max: 4,
            building_size_min: 1,
            building_size_max: 2,
            max_placement_attempts: 100_000,
        }
    }
}

impl ObstacleConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_roads(mut self, count: u32, min_range: f64, max_range: f64) -> Self {
        self.number_of_roads = count;
        self.road_min_range = min_range;
        self.road_max_range = max_range;
        self
    }

    pub fn with_buildings(mut self, count: u32) -> Self {
        self.number_of_buildings = count;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("road_min_range", self.road_min_range),
            ("road_max_range", self.road_max_range),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }
        if self.road_min_range > self.road_max_range {
            return Err(ConfigError::InvertedRange {
                name: "road range",
                min: self.road_min_range,
                max: self.road_max_range,
            });
        }
        if self.building_offset_min > self.building_offset_max {
            return Err(ConfigError::InvertedRange {
                name: "building offset",
                min: self.building_offset_min as f64,
                max: self.building_offset_max as f64,
            });
        }
        if self.building_size_min < 0 {
            return Err(ConfigError::InvertedRange {
                name: "building size",
                min: 0.0,
                max: self.building_size_min as f64,
            });
        }
        if self.building_size_min > self.building_size_max {
            return Err(ConfigError::InvertedRange {
                name: "building size",
                min: self.building_size_min as f64,
                max: self.building_size_max as f64,
            });
        }
        if self.max_placement_attempts == 0 {
            return Err(ConfigError::NoPlacementAttempts);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MapConfig {
    pub height: usize,
    pub width: usize,
    /// Noise seed; drives the permutation table and the reference sample.
    pub seed: u64,
    pub noise: NoiseConfig,
    pub tiles: Vec<TileDefinition>,
    pub obstacle_defs: Vec<ObstacleDefinition>,
    pub obstacles: ObstacleConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            height: 50,
            width: 50,
            seed: 100,
            noise: NoiseConfig::default(),
            tiles: default_tiles(),
            obstacle_defs: default_obstacles(),
            obstacles: ObstacleConfig::default(),
        }
    }
}

/// Six terrain bands from deep water to mountain.
pub fn default_tiles() -> Vec<TileDefinition> {
    vec![
        TileDefinition::new("deep_water", -1.0),
        TileDefinition::new("water", -0.5),
        TileDefinition::new("sand", 0.1),
        TileDefinition::new("grass", 0.3),
        TileDefinition::new("forest", -0.1),
        TileDefinition::new("mountain", -0.8),
    ]
}

/// Road, bridge and building, in role order.
pub fn default_obstacles() -> Vec<ObstacleDefinition> {
    vec![
        ObstacleDefinition::new("road", 0.5, TileRange::new(2, 4)),
        ObstacleDefinition::new("bridge", 0.2, TileRange::new(0, 1)),
        ObstacleDefinition::new("building", -1.0, TileRange::new(3, 4)),
    ]
}

impl MapConfig {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_tiles(mut self, tiles: Vec<TileDefinition>) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn with_obstacle_defs(mut self, defs: Vec<ObstacleDefinition>) -> Self {
        self.obstacle_defs = defs;
        self
    }

    pub fn with_obstacles(mut self, obstacles: ObstacleConfig) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn cell_count(&self) -> Option<usize> {
        self.height.checked_mul(self.width)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (height, width) = (self.height, self.width);
        if height == 0 || width == 0 {
            return Err(ConfigError::ZeroDimension { height, width });
        }
        let too_large = self.cell_count().is_none()
            || height > i32::MAX as usize
            || width > i32::MAX as usize;
        if too_large {
            return Err(ConfigError::GridTooLarge { height, width });
        }

        if self.tiles.is_empty() {
            return Err(ConfigError::EmptyTileset);
        }
        for (index, tile) in self.tiles.iter().enumerate() {
            if !tile.reward.is_finite() {
                return Err(ConfigError::NonFiniteTileReward {
                    index,
                    reward: tile.reward,
                });
            }
        }
        for (index, def) in self.obstacle_defs.iter().enumerate() {
            if def.eligible_tiles.min > def.eligible_tiles.max {
                return Err(ConfigError::EmptyEligibleRange {
                    index,
                    min: def.eligible_tiles.min,
                    max: def.eligible_tiles.max,
                });
            }
            if !def.reward_modifier.is_finite() {
                return Err(ConfigError::NonFiniteObstacleModifier {
                    index,
                    modifier: def.reward_modifier,
                });
            }
        }

        self.noise.validate()?;

        if self.obstacles.enabled {
            self.obstacles.validate()?;
            let mut required = Vec::new();
            if self.obstacles.number_of_roads > 0 {
                required.extend([ObstacleKind::Road, ObstacleKind::Bridge]);
            }
            if self.obstacles.number_of_buildings > 0 {
                required.push(ObstacleKind::Building);
            }
            for kind in required {
                if kind.index() >= self.obstacle_defs.len() {
                    return Err(ConfigError::MissingObstacle {
                        role: kind.role(),
                        index: kind.index(),
                        available: self.obstacle_defs.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A generated map: tile-type codes, rewards and the recorded road network.
///
/// Codes below `tileset_size` are base tiles; code `tileset_size + k` is
/// obstacle `k`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TileMap {
    tile_types: Grid<usize>,
    rewards: Grid<f64>,
    road_cells: Vec<Cell>,
    tileset_size: usize,
}

impl TileMap {
    /// Base terrain only: rewards looked up from `tiles`.
    ///
    /// Returns `None` if a tile type has no definition.
    pub fn from_tile_types(tile_types: Grid<usize>, tiles: &[TileDefinition]) -> Option<Self> {
        if tile_types.as_slice().iter().any(|&t| t >= tiles.len()) {
            return None;
        }
        let rewards = tile_types.map(|&t| tiles[t].reward);
        Some(Self {
            tile_types,
            rewards,
            road_cells: Vec::new(),
            tileset_size: tiles.len(),
        })
    }

    pub fn height(&self) -> usize {
        self.tile_types.height()
    }

    pub fn width(&self) -> usize {
        self.tile_types.width()
    }

    pub fn tile_types(&self) -> &Grid<usize> {
        &self.tile_types
    }

    pub fn rewards(&self) -> &Grid<f64> {
        &self.rewards
    }

    /// Every cell visited by a road walk, in walk order, duplicates included.
    pub fn road_cells(&self) -> &[Cell] {
        &self.road_cells
    }

    pub fn tileset_size(&self) -> usize {
        self.tileset_size
    }

    pub fn tile_type(&self, cell: Cell) -> Option<usize> {
        self.tile_types.get(cell).copied()
    }

    pub fn reward(&self, cell: Cell) -> Option<f64> {
        self.rewards.get(cell).copied()
    }

    /// Obstacle index at `cell`, if an obstacle has been placed there.
    pub fn obstacle_at(&self, cell: Cell) -> Option<usize> {
        self.tile_type(cell)
            .and_then(|t| t.checked_sub(self.tileset_size))
    }

    pub fn is_road_or_bridge(&self, cell: Cell) -> bool {
        matches!(self.obstacle_at(cell), Some(0 | 1))
    }

    /// In bounds, and either eligible terrain or already this obstacle.
    pub fn can_place(&self, cell: Cell, index: usize, def: &ObstacleDefinition) -> bool {
        match self.tile_type(cell) {
            Some(t) => def.eligible_tiles.contains(t) || t == self.tileset_size + index,
            None => false,
        }
    }

    /// Overwrite the tile type and add `reward_modifier` to the reward.
    /// Returns `false` when `cell` is out of bounds.
    pub fn place_obstacle(&mut self, cell: Cell, index: usize, reward_modifier: f64) -> bool {
        let code = self.tileset_size + index;
        match (self.tile_types.get_mut(cell), self.rewards.get_mut(cell)) {
            (Some(t), Some(r)) => {
                *t = code;
                *r += reward_modifier;
                true
            }
            _ => false,
        }
    }

    pub fn count_obstacle(&self, index: usize) -> usize {
        let code = self.tileset_size + index;
        self.tile_types
            .as_slice()
            .iter()
            .filter(|&&t| t == code)
            .count()
    }

    /// One line per row, codes separated by spaces.
    pub fn render_tile_types(&self) -> String {
        render(&self.tile_types, |out, v| write!(out, "{v}"))
    }

    /// One line per row, rewards separated by spaces.
    pub fn render_rewards(&self) -> String {
        render(&self.rewards, |out, v| write!(out, "{v}"))
    }

    pub fn into_parts(self) -> (Grid<usize>, Grid<f64>) {
        (self.tile_types, self.rewards)
    }
}

fn render<T>(
    grid: &Grid<T>,
    mut cell: impl FnMut(&mut String, &T) -> core::fmt::Result,
) -> String {
    let mut out = String::new();
    for row in grid.rows() {
        for (j, v) in row.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            // Writing into a String cannot fail.
            let _ = cell(&mut out, v);
        }
        out.push('\n');
    }
    out
}

/// Classifies terrain and overlays obstacles for one [`MapConfig`].
#[derive(Debug, Clone)]
pub struct MapComposer {
    config: MapConfig,
    noise: NoiseField,
}

impl MapComposer {
    pub fn new(config: MapConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let noise = NoiseField::new(
            config.noise.clone(),
            config.seed,
            config.height * config.width,
            config.tiles.len(),
        )?;
        Ok(Self { config, noise })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    /// Tile type of every cell, `(row, col)` sampled as `(x, y)`.
    pub fn classify(&self) -> Grid<usize> {
        let (height, width) = (self.config.height, self.config.width);
        let mut types = Grid::filled(height, width, 0usize);
        let noise = &self.noise;
        let fill_row = |(i, row): (usize, &mut [usize])| {
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = noise.tile_type_at(i as f64, j as f64);
            }
        };

        #[cfg(feature = "parallel")]
        types
            .as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(fill_row);

        #[cfg(not(feature = "parallel"))]
        types
            .as_mut_slice()
            .chunks_mut(width)
            .enumerate()
            .for_each(fill_row);

        types
    }

    pub fn generate(&self) -> Result<TileMap, MapError> {
        let tile_types = self.classify();
        let mut map = TileMap::from_tile_types(tile_types, &self.config.tiles)
            .ok_or(MapError::Config(ConfigError::EmptyTileset))?;

        let obstacles = &self.config.obstacles;
        if obstacles.enabled {
            let mut rng = prng::stream_rng(obstacles.seed);
            let mut overlay = Overlay {
                map: &mut map,
                defs: &self.config.obstacle_defs,
                config: obstacles,
            };
            overlay.lay_roads(&mut rng)?;
            overlay.place_buildings(&mut rng)?;
        }

        info!(
            height = self.config.height,
            width = self.config.width,
            roads = map.count_obstacle(ObstacleKind::Road.index()),
            bridges = map.count_obstacle(ObstacleKind::Bridge.index()),
            buildings = map.count_obstacle(ObstacleKind::Building.index()),
            "map generated"
        );
        Ok(map)
    }
}

struct Overlay<'a> {
    map: &'a mut TileMap,
    defs: &'a [ObstacleDefinition],
    config: &'a ObstacleConfig,
}

impl Overlay<'_> {
    fn is_valid(&self, cell: Cell, kind: ObstacleKind) -> bool {
        let Some(def) = self.defs.get(kind.index()) else {
            return false;
        };
        let eligible = self.map.can_place(cell, kind.index(), def);
        match kind {
            ObstacleKind::Building => eligible && !self.map.is_road_or_bridge(cell),
            _ => eligible,
        }
    }

    fn place(&mut self, cell: Cell, kind: ObstacleKind) {
        if let Some(def) = self.defs.get(kind.index()) {
            self.map
                .place_obstacle(cell, kind.index(), def.reward_modifier);
        }
    }

    fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Cell {
        let row = rng.gen_range(0..self.map.height() as i32);
        let col = rng.gen_range(0..self.map.width() as i32);
        Cell::new(row, col)
    }

    /// Draw candidates until one is accepted or the attempt budget runs out.
    fn search<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        what: &'static str,
        mut sample: impl FnMut(&Self, &mut R) -> Cell,
        mut accept: impl FnMut(&Self, Cell) -> bool,
    ) -> Result<Cell, MapError> {
        let attempts = self.config.max_placement_attempts;
        for _ in 0..attempts {
            let cell = sample(self, rng);
            if accept(self, cell) {
                return Ok(cell);
            }
        }
        Err(MapError::PlacementExhausted { what, attempts })
    }

    fn lay_roads<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), MapError> {
        let (min_range, max_range) = (self.config.road_min_range, self.config.road_max_range);
        let mut start: Option<Cell> = None;

        for road in 0..self.config.number_of_roads {
            // Each road continues from the previous end, which is always a road.
            let from = match start {
                Some(cell) if self.is_valid(cell, ObstacleKind::Road) => cell,
                _ => self.search(
                    rng,
                    "road start",
                    |o, rng| o.random_cell(rng),
                    |o, c| o.is_valid(c, ObstacleKind::Road),
                )?,
            };
            let to = self.search(
                rng,
                "road end",
                |o, rng| o.random_cell(rng),
                |o, c| {
                    let d = from.distance(c);
                    c != from
                        && (min_range..=max_range).contains(&d)
                        && o.is_valid(c, ObstacleKind::Road)
                },
            )?;

            let path = self.connect(from, to);
            debug!(road, %from, %to, cells = path.len(), "road laid");
            self.map.road_cells.extend(path);
            start = Some(to);
        }
        Ok(())
    }

    /// Walk a continuous point toward `to` one unit per step, placing a road
    /// or bridge on each rounded cell. The end cell always gets a road.
    fn connect(&mut self, from: Cell, to: Cell) -> Vec<Cell> {
        let target = (to.row as f64, to.col as f64);
        let mut current = (from.row as f64, from.col as f64);
        let mut path = Vec::new();

        loop {
            let cell = round_to_cell(current);
            if cell == to {
                break;
            }
            path.push(cell);
            if self.is_valid(cell, ObstacleKind::Road) {
                self.place(cell, ObstacleKind::Road);
            } else if self.is_valid(cell, ObstacleKind::Bridge) {
                self.place(cell, ObstacleKind::Bridge);
            }
            current = move_towards(current, target, 1.0);
        }

        path.push(to);
        self.place(to, ObstacleKind::Road);
        path
    }

    fn place_buildings<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), MapError> {
        if self.config.number_of_buildings == 0 {
            return Ok(());
        }
        if self.map.road_cells.is_empty() {
            return Err(MapError::NoRoadCells);
        }
        let offsets = self.config.building_offset_min..=self.config.building_offset_max;
        let sizes = self.config.building_size_min..=self.config.building_size_max;

        for building in 0..self.config.number_of_buildings {
            let anchor = self.search(
                rng,
                "building anchor",
                |o, rng| {
                    let roads = &o.map.road_cells;
                    let base = roads[rng.gen_range(0..roads.len())];
                    let dr = rng.gen_range(offsets.clone());
                    let dc = rng.gen_range(offsets.clone());
                    base.offset(Offset::new(dr, dc))
                },
                |o, c| o.is_valid(c, ObstacleKind::Building),
            )?;
            let size = rng.gen_range(sizes.clone());

            for dr in -size..=size {
                for dc in -size..=size {
                    let cell = anchor.offset(Offset::new(dr, dc));
                    if self.is_valid(cell, ObstacleKind::Building) {
                        self.place(cell, ObstacleKind::Building);
                    }
                }
            }
            debug!(building, %anchor, size, "building placed");
        }
        Ok(())
    }
}

/// Nearest cell, halves rounded to even.
fn round_to_cell((row, col): (f64, f64)) -> Cell {
    Cell::new(row.round_ties_even() as i32, col.round_ties_even() as i32)
}

/// Step from `current` toward `target` by at most `max_delta`.
fn move_towards(current: (f64, f64), target: (f64, f64), max_delta: f64) -> (f64, f64) {
    let (dr, dc) = (target.0 - current.0, target.1 - current.1);
    let dist = (dr * dr + dc * dc).sqrt();
    if dist <= max_delta || dist == 0.0 {
        target
    } else {
        (
            current.0 + dr / dist * max_delta,
            current.1 + dc / dist * max_delta,
        )
    }
}
