//! Hot-key sense
//!
//! The scheduler and the loader poll a [`KeySense`] for a bitmask of held keys.
//! Front-ends that only see key *presses* feed a [`LatchedKeys`], which holds
//! each press until the next poll consumes it.

use bitflags::bitflags;
use std::sync::atomic::{AtomicU8, Ordering};

bitflags! {
    /// Polled key state
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HotKeys: u8 {
        /// Modifier that must be held for playback hot keys
        const MODIFIER = 0x01;
        /// Pause/resume toggle
        const PAUSE = 0x02;
        /// Skip to the next track
        const SKIP = 0x04;
        /// Cancel loading
        const CANCEL = 0x08;
        /// Quit the running session
        const QUIT = 0x10;
    }
}

/// Source of polled key state
pub trait KeySense: Send + Sync {
    /// Current key state
    fn sense(&self) -> HotKeys;

    /// Whether a load cancel has been requested
    fn cancel_requested(&self) -> bool {
        self.sense().contains(HotKeys::CANCEL)
    }
}

/// Press latch shared between an input front-end and the pollers.
///
/// Playback keys are consumed by the poll that observes them; `CANCEL` and
/// `QUIT` stay set until cleared.
#[derive(Debug, Default)]
pub struct LatchedKeys {
    bits: AtomicU8,
}

impl LatchedKeys {
    const STICKY: HotKeys = HotKeys::CANCEL.union(HotKeys::QUIT);

    /// Create an empty latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press
    pub fn press(&self, keys: HotKeys) {
        self.bits.fetch_or(keys.bits(), Ordering::AcqRel);
    }

    /// Clear sticky keys
    pub fn clear(&self, keys: HotKeys) {
        self.bits.fetch_and(!keys.bits(), Ordering::AcqRel);
    }

    /// Peek at the latch without consuming anything
    pub fn peek(&self) -> HotKeys {
        HotKeys::from_bits_truncate(self.bits.load(Ordering::Acquire))
    }
}

impl KeySense for LatchedKeys {
    fn sense(&self) -> HotKeys {
        let bits = self
            .bits
            .fetch_and(Self::STICKY.bits(), Ordering::AcqRel);
        HotKeys::from_bits_truncate(bits)
    }

    fn cancel_requested(&self) -> bool {
        self.peek().contains(HotKeys::CANCEL)
    }
}
