//! Seeded 2D gradient noise blended with a reference Perlin sample.
//!
//! The custom branch is a lattice gradient noise over a grid-sized
//! permutation table (quintic fade, four diagonal gradients) summed across
//! octaves. The reference branch is [`noise::Perlin`] remapped to `[0, 1]`.
//! The two are mixed, clamped to `[0, 1]` and scaled to the tileset size.

use noise::{NoiseFn, Perlin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::permutation::PermutationTable;

/// How a floored coordinate is reduced to a lattice index.
///
/// `Mask` reproduces the classic `floor(x) & (N - 1)` reduction. For `N`
/// that is not a power of two it only reaches indices whose bits are a subset
/// of `N - 1`, which biases gradient selection. `Modulo` uses
/// `floor(x) rem_euclid N` and reaches every index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LatticeWrap {
    #[default]
    Mask,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoiseConfig {
    /// Coordinate divisor. `0.0` is treated as `1.0`.
    pub magnification: f64,
    pub x_offset: i32,
    pub y_offset: i32,
    /// Weight of the reference sample; the fractal branch gets `1 - mix`.
    pub reference_mix: f64,
    /// Amplitude multiplier applied per octave.
    pub persistence: f64,
    pub octaves: u32,
    pub lattice_wrap: LatticeWrap,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            magnification: 7.0,
            x_offset: 0,
            y_offset: 0,
            reference_mix: 0.95,
            persistence: 1.0,
            octaves: 1,
            lattice_wrap: LatticeWrap::Mask,
        }
    }
}

impl NoiseConfig {
    pub const MAX_OCTAVES: u32 = 100;
    /// Largest total octave amplitude; keeps the weighted sum of unit-range
    /// octaves finite.
    pub const MAX_AMPLITUDE_SUM: f64 = 1e300;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.magnification.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "magnification",
                value: self.magnification,
            });
        }
        if !(0.0..=1.0).contains(&self.reference_mix) {
            return Err(ConfigError::OutOfUnitRange {
                name: "reference_mix",
                value: self.reference_mix,
            });
        }
        if !self.persistence.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "persistence",
                value: self.persistence,
            });
        }
        if self.persistence <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "persistence",
                value: self.persistence,
            });
        }
        if self.octaves == 0 || self.octaves > Self::MAX_OCTAVES {
            return Err(ConfigError::Octaves(self.octaves));
        }
        let amplitudes = self.amplitude_sum();
        if !amplitudes.is_finite() || amplitudes > Self::MAX_AMPLITUDE_SUM {
            return Err(ConfigError::AmplitudeOverflow {
                octaves: self.octaves,
                persistence: self.persistence,
            });
        }
        Ok(())
    }

    /// Sum of the octave amplitudes `1 + p + p^2 + ...`.
    pub fn amplitude_sum(&self) -> f64 {
        let mut amplitude = 1.0;
        let mut sum = 0.0;
        for _ in 0..self.octaves {
            sum += amplitude;
            amplitude *= self.persistence;
        }
        sum
    }

    pub fn effective_magnification(&self) -> f64 {
        if self.magnification == 0.0 {
            1.0
        } else {
            self.magnification
        }
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.x_offset = x;
        self.y_offset = y;
        self
    }

    pub fn with_octaves(mut self, octaves: u32, persistence: f64) -> Self {
        self.octaves = octaves;
        self.persistence = persistence;
        self
    }

    pub fn with_reference_mix(mut self, mix: f64) -> Self {
        self.reference_mix = mix;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NoiseField {
    config: NoiseConfig,
    perm: PermutationTable,
    reference: Perlin,
    tileset_size: usize,
}

impl NoiseField {
    /// `lattice_size` is the permutation length (`height * width` for a map).
    pub fn new(
        config: NoiseConfig,
        seed: u64,
        lattice_size: usize,
        tileset_size: usize,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if tileset_size == 0 {
            return Err(ConfigError::EmptyTileset);
        }
        let perm = PermutationTable::build(seed, lattice_size)?;
        let reference = Perlin::new((seed ^ (seed >> 32)) as u32);
        Ok(Self {
            config,
            perm,
            reference,
            tileset_size,
        })
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    pub fn permutation(&self) -> &PermutationTable {
        &self.perm
    }

    pub fn tileset_size(&self) -> usize {
        self.tileset_size
    }

    /// Blended sample in `[0, tileset_size]`.
    pub fn value_at(&self, x: f64, y: f64) -> f64 {
        let magnification = self.config.effective_magnification();
        let x = (x + self.config.x_offset as f64) / magnification;
        let y = (y + self.config.y_offset as f64) / magnification;

        let mix = self.config.reference_mix;
        let mut value = 0.0;
        // A zero-weight branch is skipped outright, not multiplied by zero.
        if mix != 0.0 {
            value += self.reference_sample(x, y) * mix;
        }
        if mix != 1.0 {
            value += self.fractal(x, y) * (1.0 - mix);
        }

        value.clamp(0.0, 1.0) * self.tileset_size as f64
    }

    /// Tile index in `[0, tileset_size)`.
    pub fn tile_type_at(&self, x: f64, y: f64) -> usize {
        let max = (self.tileset_size - 1) as f64;
        self.value_at(x, y).floor().clamp(0.0, max) as usize
    }

    /// Single-octave reference noise in `[0, 1]`.
    pub fn reference_sample(&self, x: f64, y: f64) -> f64 {
        ((self.reference.get([x, y]) + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Octave sum normalized by the total amplitude.
    pub fn fractal(&self, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            total += self.gradient_noise(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= self.config.persistence;
            frequency *= 2.0;
        }

        total / max_value
    }

    /// One octave of lattice gradient noise.
    pub fn gradient_noise(&self, x: f64, y: f64) -> f64 {
        let fx = x.floor();
        let fy = y.floor();
        let xi = self.lattice(fx);
        let yi = self.lattice(fy);

        let lx = x - fx;
        let ly = y - fy;
        let u = fade(lx);
        let v = fade(ly);

        let p = &self.perm;
        let top_left = p.at(p.at(xi) + yi);
        let top_right = p.at(p.at(xi) + yi + 1);
        let bottom_left = p.at(p.at(xi + 1) + yi);
        let bottom_right = p.at(p.at(xi + 1) + yi + 1);

        let tx1 = grad(top_left, lx, ly);
        let tx2 = grad(bottom_left, lx - 1.0, ly);
        let bx1 = grad(top_right, lx, ly - 1.0);
        let bx2 = grad(bottom_right, lx - 1.0, ly - 1.0);

        let x1 = lerp(u, tx1, tx2);
        let x2 = lerp(u, bx1, bx2);
        lerp(v, x1, x2)
    }

    fn lattice(&self, floored: f64) -> usize {
        let n = self.perm.len() as i64;
        let i = floored as i64;
        match self.config.lattice_wrap {
            LatticeWrap::Mask => (i & (n - 1)) as usize,
            LatticeWrap::Modulo => i.rem_euclid(n) as usize,
        }
    }
}

/// Quintic fade `t^3 (6t^2 - 15t + 10)`.
#[inline]
pub fn fade(t: f64) -> f64 {
    t * t * t * ((t * 6.0 - 15.0) * t + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    match hash % 4 {
        0 => x + y,
        1 => x - y,
        2 => -x + y,
        _ => -x - y,
    }
}
