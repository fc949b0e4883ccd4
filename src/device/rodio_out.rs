//! Audio device integration using rodio
//!
//! Plays converted track buffers on the system audio device. The output
//! stream lives on a keep-alive thread; the device itself only holds the
//! `Sink`, so it can be shared with the timer thread.

use super::{AudioDevice, PlayRequest, PLAY_CHANNEL};
use crate::convert::PcmBuffer;
use crate::{PlayerError, Result};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// Source that reads samples out of a shared track buffer
struct PcmSource {
    buffer: Arc<PcmBuffer>,
    position: usize,
    generation: u64,
    current: Arc<AtomicU64>,
    remaining: Arc<AtomicUsize>,
}

impl PcmSource {
    fn new(
        buffer: Arc<PcmBuffer>,
        generation: u64,
        current: Arc<AtomicU64>,
        remaining: Arc<AtomicUsize>,
    ) -> Self {
        PcmSource {
            buffer,
            position: 0,
            generation,
            current,
            remaining,
        }
    }

    fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

impl Source for PcmSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.buffer.sample_count().saturating_sub(self.position))
    }

    fn channels(&self) -> u16 {
        self.buffer.format().output_channels()
    }

    fn sample_rate(&self) -> u32 {
        self.buffer.format().output_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis(u64::from(self.buffer.duration_ms())))
    }
}

impl Iterator for PcmSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        // Superseded by a later play or stop
        if !self.is_current() {
            return None;
        }

        let Some(sample) = self.buffer.sample(self.position) else {
            self.remaining.store(0, Ordering::Release);
            return None;
        };
        self.position += 1;
        self.remaining.store(
            self.buffer.sample_count() - self.position,
            Ordering::Release,
        );
        Some(sample)
    }
}

/// Audio playback device using rodio
pub struct RodioDevice {
    sink: Sink,
    generation: Arc<AtomicU64>,
    remaining: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    holder: Option<JoinHandle<()>>,
}

impl RodioDevice {
    /// Open the default output device
    pub fn open() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let holder = std::thread::Builder::new()
            .name("bgpcm-audio".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = tx.send(Ok(handle));
                    while !flag.load(Ordering::Acquire) {
                        std::thread::park();
                    }
                    drop(stream);
                }
                Err(e) => {
                    let _ = tx.send(Err(format!("Failed to create audio stream: {}", e)));
                }
            })?;

        let handle = rx
            .recv()
            .map_err(|e| PlayerError::AudioDeviceError(e.to_string()))?
            .map_err(PlayerError::AudioDeviceError)?;

        let sink = Sink::try_new(&handle)
            .map_err(|e| PlayerError::AudioDeviceError(format!("Failed to create audio sink: {}", e)))?;

        tracing::debug!("audio output opened");

        Ok(RodioDevice {
            sink,
            generation: Arc::new(AtomicU64::new(0)),
            remaining: Arc::new(AtomicUsize::new(0)),
            shutdown,
            holder: Some(holder),
        })
    }
}

impl AudioDevice for RodioDevice {
    fn play(&self, request: PlayRequest) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.remaining
            .store(request.buffer.sample_count(), Ordering::Release);

        let gain = request.mode.gain();
        let source = PcmSource::new(
            request.buffer,
            generation,
            Arc::clone(&self.generation),
            Arc::clone(&self.remaining),
        );
        self.sink.append(source.amplify(gain));
        self.sink.play();
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.remaining.store(0, Ordering::Release);
    }

    fn remaining(&self, channel: u8) -> usize {
        if channel == PLAY_CHANNEL {
            self.remaining.load(Ordering::Acquire)
        } else {
            0
        }
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        self.stop();
        self.sink.pause();
        self.shutdown.store(true, Ordering::Release);
        if let Some(holder) = self.holder.take() {
            holder.thread().unpark();
            let _ = holder.join();
        }
    }
}
