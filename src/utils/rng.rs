//! Seeded random number generator.
//!
//! A lightweight xorshift PRNG so that weight initialization, dropout masks and
//! dataset shuffling are reproducible from a single seed.

use std::time::{SystemTime, UNIX_EPOCH};

const FALLBACK_SEED: u64 = 0x9e3779b97f4a7c15;

/// Xorshift RNG with uniform, Gaussian and shuffling helpers.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { FALLBACK_SEED } else { seed };
        Self { state }
    }

    /// RNG seeded from the wall clock.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self::new(nanos)
    }

    /// Derive an independent generator, advancing this one.
    pub fn fork(&mut self) -> Self {
        let seed = ((self.next_u32() as u64) << 32) | self.next_u32() as u64;
        Self::new(seed)
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Uniform sample in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits fit the f32 mantissa exactly, so 1.0 is never produced
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Normal sample with the given mean and standard deviation (Box-Muller).
    pub fn gen_normal_f32(&mut self, mean: f32, std_dev: f32) -> f32 {
        // u1 in (0, 1] keeps ln() finite
        let u1 = 1.0 - self.next_f32() as f64;
        let u2 = self.next_f32() as f64;
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z as f32
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            (self.next_u32() as usize) % upper
        }
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        if data.len() <= 1 {
            return;
        }
        for i in (1..data.len()).rev() {
            let j = self.gen_usize(i + 1);
            data.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_next_f32_range() {
        let mut rng = SimpleRng::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f32();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_gen_normal_statistics() {
        let mut rng = SimpleRng::new(2024);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| rng.gen_normal_f32(0.0, 0.01)).collect();

        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n as f32;

        assert!(mean.abs() < 0.0005, "mean {} too far from 0", mean);
        assert!(
            (var.sqrt() - 0.01).abs() < 0.0005,
            "std {} too far from 0.01",
            var.sqrt()
        );
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut a = SimpleRng::new(7);
        let mut b = SimpleRng::new(7);
        let mut fa = a.fork();
        let mut fb = b.fork();
        assert_eq!(fa.next_u32(), fb.next_u32());
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let mut rng = SimpleRng::new(33333);
        let mut data: Vec<usize> = (0..10).collect();
        let original = data.clone();

        rng.shuffle(&mut data);

        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(sorted, original);
        assert_ne!(data, original);
    }

    #[test]
    fn test_shuffle_single() {
        let mut rng = SimpleRng::new(55555);
        let mut data = vec![42];
        rng.shuffle(&mut data);
        assert_eq!(data, vec![42]);
    }
}
