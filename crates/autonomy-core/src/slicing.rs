//! Cooperative Time Slicing
//!
//! A pass checks its wall-clock budget at every suspension point. Under budget
//! it keeps going; over budget it yields for one host tick. Once the pass has
//! run past its ceiling it yields once with zero duration and stops slicing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::TimeSlicingConfig;

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// How long the host should suspend the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldKind {
    /// Resume on the next host tick
    NextTick,
    /// Resume immediately; slicing is off for the rest of the pass
    ZeroDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Yield(YieldKind),
}

/// Budget bookkeeping for one pass.
#[derive(Debug, Clone)]
pub struct TimeSlicer {
    enabled: bool,
    budget: Duration,
    ceiling: Duration,
    pass_start: Duration,
    slice_start: Duration,
}

impl TimeSlicer {
    pub fn new(config: &TimeSlicingConfig, clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            enabled: config.enabled,
            budget: config.budget(),
            ceiling: config.ceiling(),
            pass_start: now,
            slice_start: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn checkpoint(&mut self, clock: &dyn Clock) -> Checkpoint {
        if !self.enabled {
            return Checkpoint::Continue;
        }

        let now = clock.now();
        if now.saturating_sub(self.slice_start) < self.budget {
            return Checkpoint::Continue;
        }
        if now.saturating_sub(self.pass_start) > self.ceiling {
            self.enabled = false;
            return Checkpoint::Yield(YieldKind::ZeroDuration);
        }
        Checkpoint::Yield(YieldKind::NextTick)
    }

    /// Starts a fresh slice after the host resumed the pass.
    pub fn resumed(&mut self, clock: &dyn Clock) {
        self.slice_start = clock.now();
    }
}
