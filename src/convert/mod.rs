//! Format Conversion
//!
//! Reduces 16-bit interleaved stereo 44.1 kHz sources to the configured output
//! format while loading:
//! - stereo to mono: `(L + R) / 2`
//! - 44.1 kHz to 22.05 kHz: keep even-indexed pairs only
//! - 16-bit to 8-bit: `value / 256`
//!
//! All divisions truncate toward zero. 16-bit samples are big-endian both in
//! the source files and in converted buffers.

pub mod pipeline;
pub mod reducer;

pub use pipeline::{FormatConverter, LoadProgress};
pub use reducer::{PcmWriter, SampleReducer};

use crate::alloc::Block;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sample rate of every source file
pub const SOURCE_SAMPLE_RATE: u32 = 44_100;

/// Output channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Left and right averaged into one channel
    Mono,
    /// Interleaved left/right
    #[default]
    Stereo,
}

/// Output sample rate relative to the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// 44.1 kHz
    #[default]
    Full,
    /// 22.05 kHz, every other pair dropped
    Half,
}

/// Output sample width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleDepth {
    /// Signed 16-bit, big-endian
    #[default]
    #[serde(rename = "16")]
    Bits16,
    /// Signed 8-bit
    #[serde(rename = "8")]
    Bits8,
}

/// Target output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Channel layout
    pub channels: ChannelMode,
    /// Sample rate
    pub rate: RateMode,
    /// Sample width
    pub depth: SampleDepth,
}

impl ConvertConfig {
    /// Build a configuration from its three settings
    pub fn new(channels: ChannelMode, rate: RateMode, depth: SampleDepth) -> Self {
        ConvertConfig {
            channels,
            rate,
            depth,
        }
    }

    /// 2 for mono, 1 for stereo
    pub fn channel_factor(&self) -> usize {
        match self.channels {
            ChannelMode::Mono => 2,
            ChannelMode::Stereo => 1,
        }
    }

    /// 2 for half rate, 1 for full rate
    pub fn rate_factor(&self) -> usize {
        match self.rate {
            RateMode::Full => 1,
            RateMode::Half => 2,
        }
    }

    /// 2 for 8-bit, 1 for 16-bit
    pub fn depth_factor(&self) -> usize {
        match self.depth {
            SampleDepth::Bits16 => 1,
            SampleDepth::Bits8 => 2,
        }
    }

    /// Exact converted size for `source_units` 16-bit source samples
    pub fn dest_bytes(&self, source_units: usize) -> usize {
        source_units * 2 / self.channel_factor() / self.rate_factor() / self.depth_factor()
    }

    /// Output sample rate in Hz
    pub fn output_rate(&self) -> u32 {
        SOURCE_SAMPLE_RATE / self.rate_factor() as u32
    }

    /// Output channel count
    pub fn output_channels(&self) -> u16 {
        match self.channels {
            ChannelMode::Mono => 1,
            ChannelMode::Stereo => 2,
        }
    }

    /// Bytes per single-channel sample
    pub fn bytes_per_sample(&self) -> usize {
        match self.depth {
            SampleDepth::Bits16 => 2,
            SampleDepth::Bits8 => 1,
        }
    }

    /// Output bit depth
    pub fn bits(&self) -> u8 {
        match self.depth {
            SampleDepth::Bits16 => 16,
            SampleDepth::Bits8 => 8,
        }
    }

    /// Converted bytes per second of audio
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.output_rate())
            * u64::from(self.output_channels())
            * self.bytes_per_sample() as u64
    }
}

/// Encoding of a track file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Raw 16-bit big-endian interleaved stereo (`.s44`)
    Raw,
    /// YM2608 ADPCM nibble stream (`.a44`)
    Adpcm,
}

impl SourceKind {
    /// Resolve the source kind from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "s44" => Some(SourceKind::Raw),
            "a44" => Some(SourceKind::Adpcm),
            _ => None,
        }
    }

    /// Number of 16-bit source sample units a file of `file_bytes` expands to
    pub fn source_units(&self, file_bytes: usize) -> usize {
        match self {
            SourceKind::Raw => file_bytes / 2,
            SourceKind::Adpcm => file_bytes * crate::decoder::EXPANSION_RATIO,
        }
    }
}

/// Converted, ready-to-play track audio
#[derive(Debug)]
pub struct PcmBuffer {
    format: ConvertConfig,
    block: Block,
}

impl PcmBuffer {
    pub(crate) fn new(format: ConvertConfig, block: Block) -> Self {
        PcmBuffer { format, block }
    }

    /// Output format of the buffer
    pub fn format(&self) -> ConvertConfig {
        self.format
    }

    /// Exact buffer size in bytes
    pub fn byte_len(&self) -> usize {
        self.block.len()
    }

    /// Raw converted bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.block.as_slice()
    }

    /// Number of whole single-channel samples
    pub fn sample_count(&self) -> usize {
        self.byte_len() / self.format.bytes_per_sample()
    }

    /// Sample at `index`, widened to 16 bits
    pub fn sample(&self, index: usize) -> Option<i16> {
        let bytes = self.as_bytes();
        match self.format.depth {
            SampleDepth::Bits16 => {
                let at = index.checked_mul(2)?;
                let pair = bytes.get(at..at + 2)?;
                Some(i16::from_be_bytes([pair[0], pair[1]]))
            }
            SampleDepth::Bits8 => bytes.get(index).map(|&b| i16::from(b as i8) << 8),
        }
    }

    /// Playing time in milliseconds
    pub fn duration_ms(&self) -> u32 {
        let ms = self.byte_len() as u64 * 1000 / self.format.bytes_per_second();
        u32::try_from(ms).unwrap_or(u32::MAX)
    }
}
