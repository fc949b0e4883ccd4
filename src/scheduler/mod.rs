//! Periodic playback scheduler
//!
//! [`PlaybackScheduler::tick`] runs once per timer period. Each tick, in order:
//! 1. accrual: `elapsed_ms += tick` unless paused
//! 2. countdown: decide whether this is a cycle tick
//! 3. end of track (cycle tick, not paused): advance, or pause on early stop
//! 4. control (cycle tick, unless step 3 advanced): pause/resume and skip keys
//! 5. lyric dispatch (every tick, not paused, not quiet): at most one caption
//!
//! The tick performs no I/O of its own and does not allocate. Its only lock
//! guards the shuffle generator, which nothing else touches.

pub mod countdown;
pub mod timer;

pub use countdown::Countdown;
pub use timer::{PeriodicTimer, ThreadTimer, TickCallback};

use crate::config::PlayerConfig;
use crate::device::{AudioDevice, PlayRequest, PLAY_CHANNEL};
use crate::display::{self, Display};
use crate::keys::{HotKeys, KeySense};
use crate::playlist::{Playlist, Track};
use crate::{PlayerError, Result};
use bitflags::bitflags;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

bitflags! {
    /// What a single tick did
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TickOutcome: u8 {
        /// Moved to another track
        const ADVANCED = 0x01;
        /// Playback stopped early and was paused
        const ABORTED = 0x02;
        /// Paused by the pause key
        const PAUSED = 0x04;
        /// Resumed by the pause key
        const RESUMED = 0x08;
        /// A caption was shown
        const LYRIC = 0x10;
        /// A caption older than the guard was dropped
        const LYRIC_DISCARDED = 0x20;
        /// The cycle phases ran
        const CYCLE = 0x40;
    }
}

/// Shared playback position and flags
#[derive(Debug)]
pub struct PlaybackState {
    current: AtomicUsize,
    paused: AtomicBool,
    elapsed_ms: AtomicU32,
    countdown: Countdown,
}

impl PlaybackState {
    /// Stopped at track 0
    pub fn new(cycle_ticks: u32) -> Self {
        PlaybackState {
            current: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            elapsed_ms: AtomicU32::new(0),
            countdown: Countdown::new(cycle_ticks),
        }
    }

    /// Index of the current track
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Milliseconds played of the current track
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms.load(Ordering::Acquire)
    }

    /// Cycle countdown
    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    fn accrue(&self, ms: u32) {
        let _ = self
            .elapsed_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |e| {
                Some(e.saturating_add(ms))
            });
    }

    fn begin(&self, index: usize) {
        self.current.store(index, Ordering::Release);
        self.elapsed_ms.store(0, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    tick_ms: u32,
    lyric_guard_ms: u32,
    abort_margin_ms: u32,
}

/// Drives playback of a loaded playlist from the periodic tick
pub struct PlaybackScheduler {
    playlist: Playlist,
    state: PlaybackState,
    timing: Timing,
    device: Arc<dyn AudioDevice>,
    display: Arc<dyn Display>,
    keys: Arc<dyn KeySense>,
    shuffle_rng: Mutex<StdRng>,
}

impl PlaybackScheduler {
    /// Scheduler for `playlist`; fails if the playlist is empty
    pub fn new(
        playlist: Playlist,
        config: &PlayerConfig,
        device: Arc<dyn AudioDevice>,
        display: Arc<dyn Display>,
        keys: Arc<dyn KeySense>,
    ) -> Result<Self> {
        if playlist.is_empty() {
            return Err(PlayerError::ConfigError("playlist is empty".into()));
        }
        let shuffle_rng = StdRng::try_from_os_rng()
            .map_err(|e| PlayerError::Other(format!("cannot seed shuffle: {e}")))?;
        Ok(PlaybackScheduler {
            playlist,
            state: PlaybackState::new(config.cycle_ticks),
            timing: Timing {
                tick_ms: config.tick_interval_ms,
                lyric_guard_ms: config.lyric_guard_ms,
                abort_margin_ms: config.abort_margin_ms,
            },
            device,
            display,
            keys,
            shuffle_rng: Mutex::new(shuffle_rng),
        })
    }

    /// Loaded tracks
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Playback position and flags
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Audio device in use
    pub fn device(&self) -> &Arc<dyn AudioDevice> {
        &self.device
    }

    /// Track currently selected
    pub fn current_track(&self) -> Option<&Track> {
        self.track_at(self.state.current())
    }

    /// Start playing the first track
    pub fn start(&self) {
        self.begin(0);
    }

    /// Run one scheduler period
    pub fn tick(&self) -> TickOutcome {
        let mut outcome = TickOutcome::empty();

        if !self.state.is_paused() {
            self.state.accrue(self.timing.tick_ms);
        }

        if self.state.countdown.tick() {
            outcome |= TickOutcome::CYCLE;
            if !self.state.is_paused() {
                outcome |= self.check_end_of_track();
            }
            if !outcome.contains(TickOutcome::ADVANCED) {
                outcome |= self.check_hot_keys();
            }
        }

        if !self.state.is_paused() && !self.playlist.quiet() {
            outcome |= self.dispatch_lyric();
        }

        outcome
    }

    fn track_at(&self, index: usize) -> Option<&Track> {
        self.playlist
            .id_at(index)
            .and_then(|id| self.playlist.get(id))
    }

    fn check_end_of_track(&self) -> TickOutcome {
        if self.device.remaining(PLAY_CHANNEL) != 0 {
            return TickOutcome::empty();
        }

        let Some(track) = self.current_track() else {
            return TickOutcome::empty();
        };
        let left = track.duration_ms().saturating_sub(self.state.elapsed_ms());
        if left >= self.timing.abort_margin_ms {
            self.state.set_paused(true);
            if !self.playlist.quiet() {
                display::show_aborted(self.display.as_ref());
            }
            return TickOutcome::ABORTED;
        }

        self.advance();
        TickOutcome::ADVANCED
    }

    fn check_hot_keys(&self) -> TickOutcome {
        let keys = self.keys.sense();
        if !keys.contains(HotKeys::MODIFIER) {
            return TickOutcome::empty();
        }

        if keys.contains(HotKeys::PAUSE) {
            if self.state.is_paused() {
                self.device.resume();
                if let Some(track) = self.current_track().filter(|_| !self.playlist.quiet()) {
                    display::show_now_playing(self.display.as_ref(), track.banner());
                }
                self.state.set_paused(false);
                TickOutcome::RESUMED
            } else {
                self.device.pause();
                if !self.playlist.quiet() {
                    display::show_paused(self.display.as_ref());
                }
                self.state.set_paused(true);
                TickOutcome::PAUSED
            }
        } else if keys.contains(HotKeys::SKIP) {
            self.device.pause();
            self.device.stop();
            self.advance();
            TickOutcome::ADVANCED
        } else {
            TickOutcome::empty()
        }
    }

    fn dispatch_lyric(&self) -> TickOutcome {
        let Some(lyrics) = self.current_track().and_then(Track::lyrics) else {
            return TickOutcome::empty();
        };
        let Some(event) = lyrics.peek_event() else {
            return TickOutcome::empty();
        };

        if event.start_ms < self.timing.lyric_guard_ms {
            lyrics.next_event();
            return TickOutcome::LYRIC_DISCARDED;
        }
        if event.start_ms <= self.state.elapsed_ms() {
            display::show_lyric(self.display.as_ref(), event);
            lyrics.next_event();
            return TickOutcome::LYRIC;
        }
        TickOutcome::empty()
    }

    fn advance(&self) {
        let len = self.playlist.len();
        let next = if self.playlist.shuffle() {
            self.shuffle_rng.lock().random_range(0..len)
        } else {
            (self.state.current() + 1) % len
        };
        self.begin(next);
    }

    fn begin(&self, index: usize) {
        let Some(track) = self.track_at(index) else {
            return;
        };
        if let Some(lyrics) = track.lyrics() {
            lyrics.reset();
        }
        if !self.playlist.quiet() {
            display::clear_lyrics(self.display.as_ref());
        }

        self.device
            .play(PlayRequest::new(Arc::clone(track.buffer()), track.volume()));
        self.state.begin(index);

        if !self.playlist.quiet() {
            display::show_now_playing(self.display.as_ref(), track.banner());
        }
    }
}
