//! Seeded fault injection.
//!
//! A [`FaultInjector`] decides, before each event the simulated transport
//! reports, whether the connection drops instead. The same seed always
//! produces the same sequence of decisions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Reason carried by the close event of an injected drop.
pub const INJECTED_DROP: &str = "injected network drop";

/// Deterministic source of connection drops.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: ChaCha8Rng,
    drop_rate: f64,
    drops: usize,
}

impl FaultInjector {
    /// Drop the connection before each event with probability `drop_rate`.
    ///
    /// `drop_rate` is clamped to `0.0..=1.0`; NaN means never.
    pub fn new(seed: u64, drop_rate: f64) -> Self {
        let drop_rate = if drop_rate.is_nan() { 0.0 } else { drop_rate.clamp(0.0, 1.0) };
        Self { rng: ChaCha8Rng::seed_from_u64(seed), drop_rate, drops: 0 }
    }

    /// Whether the connection should drop now.
    pub fn should_drop(&mut self) -> bool {
        let dropped = self.rng.gen_bool(self.drop_rate);
        if dropped {
            self.drops += 1;
        }
        dropped
    }

    /// Uniform pick in `0..upper`, from the same seeded stream.
    pub fn pick(&mut self, upper: usize) -> usize {
        if upper == 0 { 0 } else { self.rng.gen_range(0..upper) }
    }

    /// Number of drops injected so far.
    pub fn drops(&self) -> usize {
        self.drops
    }
}
