//! Startup and teardown
//!
//! A [`Session`] owns the running scheduler and the timer that drives it.
//! Teardown removes the periodic callback before stopping the device, then
//! releases every track buffer; it also runs on drop.

use crate::alloc::BulkAllocator;
use crate::config::PlayerConfig;
use crate::convert::SourceKind;
use crate::decoder::Decoder;
use crate::device::AudioDevice;
use crate::loader::TrackSource;
use crate::scheduler::{PeriodicTimer, PlaybackScheduler};
use crate::{PlayerError, Result};
use std::sync::Arc;
use std::time::Duration;

/// What teardown released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Tracks released
    pub tracks: usize,
    /// Buffer bytes released
    pub bytes: usize,
}

/// A running playback session
pub struct Session {
    scheduler: Option<Arc<PlaybackScheduler>>,
    timer: Box<dyn PeriodicTimer>,
}

impl Session {
    /// Check collaborators before any loading starts
    pub fn preflight(
        allocator: &dyn BulkAllocator,
        device: &dyn AudioDevice,
        decoder: Option<&dyn Decoder>,
        sources: &[TrackSource],
    ) -> Result<()> {
        if !allocator.is_available() {
            return Err(PlayerError::OutOfMemory {
                requested: 0,
                available: 0,
            });
        }
        if !device.is_available() {
            return Err(PlayerError::AudioDeviceError("audio device is not available".into()));
        }
        if sources.iter().any(|s| s.kind == SourceKind::Adpcm)
            && !decoder.is_some_and(|d| d.is_available())
        {
            return Err(PlayerError::DecoderError(
                "ADPCM decoder is not available".into(),
            ));
        }
        Ok(())
    }

    /// Start playback of track 0 and install the periodic tick.
    ///
    /// On failure the device is stopped and the scheduler (with every buffer)
    /// is dropped, so nothing stays resident.
    pub fn start(
        scheduler: PlaybackScheduler,
        timer: Box<dyn PeriodicTimer>,
        config: &PlayerConfig,
    ) -> Result<Self> {
        let scheduler = Arc::new(scheduler);
        scheduler.start();

        let ticker = Arc::clone(&scheduler);
        let interval = Duration::from_millis(u64::from(config.tick_interval_ms));
        if let Err(e) = timer.install(
            interval,
            Box::new(move || {
                ticker.tick();
            }),
        ) {
            scheduler.device().pause();
            scheduler.device().stop();
            return Err(e);
        }

        tracing::info!(
            tracks = scheduler.playlist().len(),
            interval_ms = config.tick_interval_ms,
            "session started"
        );
        Ok(Session {
            scheduler: Some(scheduler),
            timer,
        })
    }

    /// Running scheduler
    pub fn scheduler(&self) -> Option<&PlaybackScheduler> {
        self.scheduler.as_deref()
    }

    /// Stop playback and release everything
    pub fn teardown(mut self) -> TeardownReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> TeardownReport {
        let Some(scheduler) = self.scheduler.take() else {
            return TeardownReport { tracks: 0, bytes: 0 };
        };

        // no tick may observe the stopped device
        self.timer.uninstall();
        scheduler.device().pause();
        scheduler.device().stop();

        let report = TeardownReport {
            tracks: scheduler.playlist().len(),
            bytes: scheduler.playlist().total_bytes(),
        };
        drop(scheduler);

        tracing::info!(tracks = report.tracks, bytes = report.bytes, "session torn down");
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
