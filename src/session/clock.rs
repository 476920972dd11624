//! Monotonic Clocks

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Source of monotonic milliseconds.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> f64;
}

/// Wall-clock-independent time since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Clock starting at `start_ms`.
    pub fn new(start_ms: f64) -> Self {
        Self { now: Rc::new(Cell::new(start_ms)) }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
