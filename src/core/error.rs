use thiserror::Error;

use crate::grid::Cell;

/// Configuration problems. Always fatal: nothing is generated or trained
/// from a configuration that fails validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("grid dimensions must be positive (got {height}x{width})")]
    ZeroDimension { height: usize, width: usize },
    #[error("grid of {height}x{width} cells is too large")]
    GridTooLarge { height: usize, width: usize },
    #[error("tileset must contain at least one tile definition")]
    EmptyTileset,
    #[error("tile {index} reward must be finite (got {reward})")]
    NonFiniteTileReward { index: usize, reward: f64 },
    #[error("obstacle set has {available} definitions but the {role} role needs index {index}")]
    MissingObstacle {
        role: &'static str,
        index: usize,
        available: usize,
    },
    #[error("obstacle {index} has an empty eligible tile range {min}..={max}")]
    EmptyEligibleRange { index: usize, min: usize, max: usize },
    #[error("obstacle {index} reward modifier must be finite (got {modifier})")]
    NonFiniteObstacleModifier { index: usize, modifier: f64 },
    #[error("{name} must be in [0, 1] (got {value})")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} must be finite (got {value})")]
    NotFinite { name: &'static str, value: f64 },
    #[error("{name} must be > 0 (got {value})")]
    NotPositive { name: &'static str, value: f64 },
    #[error("{name} range is inverted ({min} > {max})")]
    InvertedRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("octaves must be in 1..=100 (got {0})")]
    Octaves(u32),
    #[error("{octaves} octaves at persistence {persistence} overflow the amplitude sum")]
    AmplitudeOverflow { octaves: u32, persistence: f64 },
    #[error("permutation size must be > 0")]
    EmptyPermutation,
    #[error("max_placement_attempts must be >= 1")]
    NoPlacementAttempts,
    #[error("{what} cell {cell} is outside the {height}x{width} grid")]
    CellOutOfBounds {
        what: &'static str,
        cell: Cell,
        height: usize,
        width: usize,
    },
    #[error("{what} grid is {actual_height}x{actual_width}, expected {height}x{width}")]
    DimensionMismatch {
        what: &'static str,
        height: usize,
        width: usize,
        actual_height: usize,
        actual_width: usize,
    },
}

/// Errors raised while composing a map.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no eligible {what} cell found after {attempts} attempts")]
    PlacementExhausted { what: &'static str, attempts: u32 },
    #[error("buildings were requested but no road cells exist to anchor them")]
    NoRoadCells,
}

/// Errors surfaced by a [`crate::session::Session`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("map has not been generated yet; call generate() first")]
    NotGenerated,
}
