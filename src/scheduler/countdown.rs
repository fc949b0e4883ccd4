//! Cycle countdown
//!
//! Splits the tick stream into cycles: the tick that finds the counter at 0
//! fires the cycle phases and reloads the counter to the cycle length.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Tick countdown shared between the timer thread and observers
#[derive(Debug)]
pub struct Countdown {
    /// Ticks between cycle firings
    cycle: u32,
    /// Ticks until the next firing
    remaining: AtomicU32,
    /// Total firings (for diagnostics)
    fired: AtomicU64,
}

impl Countdown {
    /// New countdown; the first tick fires
    pub fn new(cycle: u32) -> Self {
        Countdown {
            cycle,
            remaining: AtomicU32::new(0),
            fired: AtomicU64::new(0),
        }
    }

    /// Clock the countdown by one tick.
    /// Returns true if the cycle phases run on this tick
    pub fn tick(&self) -> bool {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining == 0 {
            self.remaining.store(self.cycle, Ordering::Release);
            self.fired.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            self.remaining.store(remaining - 1, Ordering::Release);
            false
        }
    }

    /// Ticks until the next firing
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Ticks between firings
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Number of firings so far
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Fire again on the next tick
    pub fn reset(&self) {
        self.remaining.store(0, Ordering::Release);
    }
}
