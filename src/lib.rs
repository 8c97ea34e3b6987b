//! # noisepath
//!
//! Procedural tile maps from seeded gradient noise, with road, bridge and
//! building overlays, and two pathfinders over the resulting reward grid:
//! a tabular Q-learning agent and a random-walk baseline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use noisepath::prelude::*;
//!
//! let config = RunConfig::default().with_master_seed(42);
//! let mut session = Session::configure(config).unwrap();
//! session.generate().unwrap();
//!
//! let outcome = session.run().unwrap();
//! println!("reached: {} in {} cells", outcome.succeeded, outcome.path.len());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialization of configs, maps and outcomes
//! - `parallel`: Row-parallel map classification via rayon
//!
//! ## Modules
//!
//! - [`noise_field`]: Gradient noise blended with a reference Perlin sample
//! - [`map`]: Terrain classification and obstacle overlays
//! - [`qlearning`]: Q-learning pathfinder
//! - [`random_walk`]: Random-walk baseline
//! - [`session`]: Explicit configure / generate / run lifecycle
//! - [`observer`]: Read-only snapshot adapters

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/permutation.rs"]
pub mod permutation;

#[path = "core/noise_field.rs"]
pub mod noise_field;

#[path = "core/map.rs"]
pub mod map;

#[path = "core/stats.rs"]
pub mod stats;

#[path = "core/qlearning.rs"]
pub mod qlearning;

#[path = "core/random_walk.rs"]
pub mod random_walk;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/session.rs"]
pub mod session;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use noisepath::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigFileError, RunConfig};
    pub use crate::error::{ConfigError, MapError, RunError};
    pub use crate::grid::{Cell, Connectivity, Grid};
    pub use crate::map::{
        MapComposer, MapConfig, ObstacleConfig, ObstacleDefinition, ObstacleKind, TileDefinition,
        TileMap, TileRange,
    };
    pub use crate::noise_field::{LatticeWrap, NoiseConfig, NoiseField};
    pub use crate::prng::{stream_rng, SeedSet, Stream, StreamRng};
    pub use crate::qlearning::{PathOutcome, PathfinderConfig, QLearningPathfinder};
    pub use crate::random_walk::{RandomWalk, RandomWalkConfig, WalkOutcome};
    pub use crate::session::Session;
    pub use crate::stats::TrainingStats;
}
