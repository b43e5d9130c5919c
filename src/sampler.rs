//! Seeded, reproducible shuffling
//!
//! Every call derives a fresh `StdRng` from the sampler seed and a salt, so
//! the output of one call does not depend on how many calls came before it.
//! Same seed, same salt, same input order: same output.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seed used when the caller does not supply one.
pub const DEFAULT_SEED: u64 = 42;

/// Deterministic shuffle/partition primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededSampler {
    seed: u64,
}

impl Default for SeededSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl SeededSampler {
    /// Create a sampler for the given seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// The seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    fn rng(&self, salt: u64) -> StdRng {
        let mixed = self
            .seed
            .wrapping_add(salt.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .rotate_left(17);
        StdRng::seed_from_u64(mixed)
    }

    /// Shuffle a copy of `items`.
    #[must_use]
    pub fn shuffle<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.shuffle_salted(items, 0)
    }

    /// Shuffle a copy of `items` using an independent stream selected by `salt`.
    #[must_use]
    pub fn shuffle_salted<T: Clone>(&self, items: &[T], salt: u64) -> Vec<T> {
        let mut out = items.to_vec();
        out.shuffle(&mut self.rng(salt));
        out
    }

    /// Draw up to `n` items without replacement.
    #[must_use]
    pub fn sample<T: Clone>(&self, items: &[T], n: usize, salt: u64) -> Vec<T> {
        let mut out = self.shuffle_salted(items, salt);
        out.truncate(n);
        out
    }

    /// Draw up to `n` indices from `0..len` without replacement.
    #[must_use]
    pub fn sample_indices(&self, len: usize, n: usize, salt: u64) -> Vec<usize> {
        let indices: Vec<usize> = (0..len).collect();
        self.sample(&indices, n, salt)
    }
}
