//! Seeded random numbers
//!
//! Each sketch owns its own generator, so two sketches in one process never
//! disturb each other's sequence.

use std::time::{SystemTime, UNIX_EPOCH};

/// Deterministic xorshift64 generator
#[derive(Debug, Clone)]
pub struct Random {
    state: u64,
    next_gaussian: Option<f32>,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1), // xorshift is stuck at zero
            next_gaussian: None,
        }
    }

    /// Seed from the wall clock
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64);
        Self::new(nanos)
    }

    /// Restart the sequence
    pub fn set_seed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, 1)`
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in `[0, high)`; 0 when `high` is 0
    pub fn random(&mut self, high: f32) -> f32 {
        self.random_range(0.0, high)
    }

    /// Uniform in `[low, high)`. Returns `low` for an empty range.
    pub fn random_range(&mut self, low: f32, high: f32) -> f32 {
        if low >= high {
            return low;
        }
        let v = low + self.next_f32() * (high - low);
        // Rounding can land exactly on the upper bound
        if v >= high {
            low
        } else {
            v
        }
    }

    /// Uniform integer in `[min, max]`
    pub fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let span = (i64::from(max) - i64::from(min) + 1) as u64;
        (i64::from(min) + (self.next_u64() % span) as i64) as i32
    }

    /// Standard normal sample (mean 0, deviation 1), polar Box-Muller
    pub fn gaussian(&mut self) -> f32 {
        if let Some(g) = self.next_gaussian.take() {
            return g;
        }
        loop {
            let v1 = 2.0 * self.next_f32() - 1.0;
            let v2 = 2.0 * self.next_f32() - 1.0;
            let s = v1 * v1 + v2 * v2;
            if s < 1.0 && s != 0.0 {
                let multiplier = (-2.0 * s.ln() / s).sqrt();
                self.next_gaussian = Some(v2 * multiplier);
                return v1 * multiplier;
            }
        }
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::from_time()
    }
}
