use rand::Rng;

use crate::error::ConfigError;
use crate::prng;

/// Seeded bijection on `[0, size)` used to pick lattice gradients.
///
/// Built once and never mutated. Lookups through [`PermutationTable::at`]
/// wrap modulo the table size, so callers may pass sums of two entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationTable {
    values: Vec<usize>,
}

impl PermutationTable {
    /// Build from a seed with a private generator, so the result does not
    /// depend on any other random stream in the process.
    pub fn build(seed: u64, size: usize) -> Result<Self, ConfigError> {
        let mut rng = prng::stream_rng(seed);
        Self::shuffled(&mut rng, size)
    }

    /// Identity permutation followed by one pass of swaps: slot `i` trades
    /// with a uniformly drawn slot in `[0, size)`, which may be `i` itself.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::EmptyPermutation);
        }
        let mut values: Vec<usize> = (0..size).collect();
        for i in 0..size {
            let j = rng.gen_range(0..size);
            values.swap(i, j);
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn at(&self, index: usize) -> usize {
        self.values[index % self.values.len()]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.values
    }

    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.values.len()];
        for &v in &self.values {
            match seen.get_mut(v) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_table() {
        let a = PermutationTable::build(100, 64).unwrap();
        let b = PermutationTable::build(100, 64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_table() {
        let a = PermutationTable::build(1, 256).unwrap();
        let b = PermutationTable::build(2, 256).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn every_table_is_a_bijection() {
        for seed in 0..20 {
            for size in [1, 2, 7, 25, 100] {
                let t = PermutationTable::build(seed, size).unwrap();
                assert_eq!(t.len(), size);
                assert!(t.is_bijection(), "seed {seed} size {size}");
            }
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        assert_eq!(
            PermutationTable::build(0, 0),
            Err(ConfigError::EmptyPermutation)
        );
    }

    #[test]
    fn lookups_wrap() {
        let t = PermutationTable::build(9, 10).unwrap();
        assert_eq!(t.at(13), t.at(3));
        assert_eq!(t.at(19), t.at(9));
    }

    #[test]
    fn unrelated_draws_do_not_change_build() {
        let before = PermutationTable::build(5, 32).unwrap();
        let mut other = prng::stream_rng(5);
        for _ in 0..100 {
            let _: u32 = other.gen();
        }
        let after = PermutationTable::build(5, 32).unwrap();
        assert_eq!(before, after);
    }
}
