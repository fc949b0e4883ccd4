//! Compressed source decoding
//!
//! A [`Decoder`] expands a compressed byte chunk into 16-bit interleaved
//! stereo samples. Every input byte yields [`EXPANSION_RATIO`] sample units.

pub mod adpcm;

pub use adpcm::Ym2608Adpcm;

use crate::Result;

/// 16-bit output sample units produced per compressed input byte
pub const EXPANSION_RATIO: usize = 4;

/// Compressed-source decoder
pub trait Decoder: Send {
    /// Whether the decoder can be used
    fn is_available(&self) -> bool {
        true
    }

    /// Prepare for a new source.
    ///
    /// `capacity` is the largest number of output samples a single
    /// [`decode`](Decoder::decode) call will be asked to produce.
    fn init(&mut self, capacity: usize, rate: u32, channels: u16) -> Result<()>;

    /// Decode `input` into `output`, returning the number of samples written
    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> Result<usize>;

    /// Release per-source state
    fn close(&mut self);
}
