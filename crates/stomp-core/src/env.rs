//! Environment abstraction.
//!
//! The engine never reads the clock directly. Production uses [`SystemEnv`];
//! tests supply a virtual clock so timestamps are deterministic.

use std::time::Instant;

/// Source of time for the engine.
pub trait Environment {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall-clock environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
