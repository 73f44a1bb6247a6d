//! Virtual clock for deterministic tests.
//!
//! Time only moves when the test calls [`SimEnv::advance`]. Clones share the
//! same clock, so a test can keep one handle while the session owns another.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use stomp_core::env::Environment;

/// Manually advanced clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl SimEnv {
    /// Clock frozen at the moment of creation.
    pub fn new() -> Self {
        Self { base: Instant::now(), offset_ms: Arc::new(AtomicU64::new(0)) }
    }

    /// Move time forward by `by`, at millisecond resolution.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_ms.fetch_add(millis, Ordering::SeqCst);
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_only_moves_on_advance() {
        let env = SimEnv::new();
        let start = env.now();

        assert_eq!(env.now(), start);

        env.advance(Duration::from_millis(1500));
        assert_eq!(env.now() - start, Duration::from_millis(1500));
    }

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        other.advance(Duration::from_secs(3));

        assert_eq!(env.elapsed(), Duration::from_secs(3));
        assert_eq!(env.now(), other.now());
    }
}
