// Seed plumbing for the independent random streams.
//
// This is NOT cryptographically secure.
// It is used only for map synthesis, exploration and reproducible evaluation.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Concrete generator behind every stream.
pub type StreamRng = ChaCha8Rng;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// The logically distinct consumers of randomness.
///
/// Each stream draws from its own generator so that, for example, changing the
/// obstacle count never perturbs the noise permutation or the agent's exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stream {
    Noise,
    Obstacles,
    Exploration,
}

impl Stream {
    fn salt(self) -> u64 {
        match self {
            Stream::Noise => 0x4E4F_4953_4500_0001, // "NOISE"
            Stream::Obstacles => 0x4F42_5354_0000_0002,
            Stream::Exploration => 0x4558_504C_0000_0003,
        }
    }
}

/// One splitmix64 step.
#[inline]
pub fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(GOLDEN_GAMMA);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the seed of `stream` from a single master seed.
pub fn derive_seed(master: u64, stream: Stream) -> u64 {
    let mut state = master ^ stream.salt();
    splitmix64(&mut state)
}

/// Fresh generator for an explicit stream seed.
pub fn stream_rng(seed: u64) -> StreamRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Per-stream seeds, either given explicitly or derived from a master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeedSet {
    pub noise: u64,
    pub obstacles: u64,
    pub exploration: u64,
}

impl SeedSet {
    pub fn from_master(master: u64) -> Self {
        Self {
            noise: derive_seed(master, Stream::Noise),
            obstacles: derive_seed(master, Stream::Obstacles),
            exploration: derive_seed(master, Stream::Exploration),
        }
    }

    pub fn seed(&self, stream: Stream) -> u64 {
        match stream {
            Stream::Noise => self.noise,
            Stream::Obstacles => self.obstacles,
            Stream::Exploration => self.exploration,
        }
    }

    pub fn rng(&self, stream: Stream) -> StreamRng {
        stream_rng(self.seed(stream))
    }
}
