//! Audio device abstraction
//!
//! The scheduler drives playback through [`AudioDevice`]. A play request
//! carries the packed device mode word built by [`PlayMode::new`]:
//!
//! ```text
//! bits 16..24  volume
//! bits  8..16  frequency code
//! bits  0..8   pan
//! ```

#[cfg(feature = "streaming")]
mod rodio_out;

#[cfg(feature = "streaming")]
pub use rodio_out::RodioDevice;

use crate::convert::{ChannelMode, ConvertConfig, PcmBuffer, RateMode, SampleDepth};
use std::sync::Arc;

/// Output channel used for track playback
pub const PLAY_CHANNEL: u8 = 0;
/// Centre pan (both outputs enabled)
pub const PAN_CENTER: u8 = 0x03;
/// Device sample clock
pub const SAMPLE_CLOCK: u32 = 44_100 * 256;

const FREQ_FULL: u8 = 0x0d;
const FREQ_HALF: u8 = 0x0a;
const FREQ_STEREO: u8 = 0x10;
const FREQ_8BIT: u8 = 0x08;

/// Packed device mode word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayMode(u32);

impl PlayMode {
    /// Pack volume, the frequency code for `format`, and centre pan
    pub fn new(volume: u8, format: &ConvertConfig) -> Self {
        PlayMode(
            (u32::from(volume) << 16)
                | (u32::from(frequency_code(format)) << 8)
                | u32::from(PAN_CENTER),
        )
    }

    /// Raw mode word
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Volume field
    pub fn volume(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Frequency code field
    pub fn frequency_code(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Pan field
    pub fn pan(self) -> u8 {
        self.0 as u8
    }

    /// Linear gain for the volume field, 8 being unity
    pub fn gain(self) -> f32 {
        f32::from(self.volume()) / 8.0
    }
}

/// Frequency code for an output format
pub fn frequency_code(format: &ConvertConfig) -> u8 {
    let mut code = match format.rate {
        RateMode::Full => FREQ_FULL,
        RateMode::Half => FREQ_HALF,
    };
    if format.channels == ChannelMode::Stereo {
        code += FREQ_STEREO;
    }
    if format.depth == SampleDepth::Bits8 {
        code += FREQ_8BIT;
    }
    code
}

/// A single play command
#[derive(Debug, Clone)]
pub struct PlayRequest {
    /// Device channel
    pub channel: u8,
    /// Packed mode word
    pub mode: PlayMode,
    /// Buffer length in bytes
    pub length: usize,
    /// Device sample clock
    pub sample_clock: u32,
    /// Audio to play
    pub buffer: Arc<PcmBuffer>,
}

impl PlayRequest {
    /// Request to play `buffer` at `volume` on the track channel
    pub fn new(buffer: Arc<PcmBuffer>, volume: u8) -> Self {
        PlayRequest {
            channel: PLAY_CHANNEL,
            mode: PlayMode::new(volume, &buffer.format()),
            length: buffer.byte_len(),
            sample_clock: SAMPLE_CLOCK,
            buffer,
        }
    }
}

/// Audio output consumed by the scheduler.
///
/// Every method is called from the periodic tick and must not block.
pub trait AudioDevice: Send + Sync {
    /// Whether the device is present and usable
    fn is_available(&self) -> bool {
        true
    }

    /// Start playing a buffer, replacing whatever is playing
    fn play(&self, request: PlayRequest);

    /// Pause output
    fn pause(&self);

    /// Resume paused output
    fn resume(&self);

    /// Stop output and discard the current buffer
    fn stop(&self);

    /// Samples still to be played on `channel`; 0 once playback has ended
    fn remaining(&self, channel: u8) -> usize;
}
