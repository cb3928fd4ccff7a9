//! Seeded RNG for reproducible simulated payloads.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded RNG wrapper.
pub struct MockRng {
    inner: ChaCha8Rng,
}

impl MockRng {
    /// Create with an optional seed; `None` seeds from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { inner }
    }

    /// True with probability `rate` (clamped to 0.0..=1.0).
    pub fn should_fail(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        self.inner.gen::<f64>() < rate
    }

    /// A 12-bit ADC sample.
    pub fn sample(&mut self) -> u32 {
        self.inner.gen_range(0..4096)
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng")
            .field("inner", &"<ChaCha8Rng>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_deterministic() {
        let mut a = MockRng::new(Some(42));
        let mut b = MockRng::new(Some(42));
        let xs: Vec<u32> = (0..8).map(|_| a.sample()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.sample()).collect();
        assert_eq!(xs, ys, "Same seed should produce same samples");
    }

    #[test]
    fn test_should_fail_bounds() {
        let mut rng = MockRng::new(Some(7));
        assert!((0..100).all(|_| !rng.should_fail(0.0)));
        assert!((0..100).all(|_| rng.should_fail(1.0)));
    }

    #[test]
    fn test_sample_range() {
        let mut rng = MockRng::new(Some(1));
        assert!((0..1000).all(|_| rng.sample() < 4096));
    }
}
