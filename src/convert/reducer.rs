//! Per-pair sample reduction and bounded output writer

use super::{ChannelMode, ConvertConfig, RateMode, SampleDepth};

/// Writes converted samples into a fixed destination slice.
///
/// Samples that no longer fit are dropped, so the destination never grows past
/// the size computed up front.
#[derive(Debug)]
pub struct PcmWriter<'a> {
    dest: &'a mut [u8],
    offset: usize,
    depth: SampleDepth,
}

impl<'a> PcmWriter<'a> {
    /// Writer positioned at the start of `dest`
    pub fn new(dest: &'a mut [u8], depth: SampleDepth) -> Self {
        PcmWriter {
            dest,
            offset: 0,
            depth,
        }
    }

    /// Store one 16-bit value at the configured depth
    #[inline]
    pub fn push(&mut self, value: i16) {
        match self.depth {
            SampleDepth::Bits16 => {
                if let Some(slot) = self.dest.get_mut(self.offset..self.offset + 2) {
                    slot.copy_from_slice(&value.to_be_bytes());
                    self.offset += 2;
                }
            }
            SampleDepth::Bits8 => {
                if let Some(slot) = self.dest.get_mut(self.offset) {
                    *slot = (value / 256) as i8 as u8;
                    self.offset += 1;
                }
            }
        }
    }

    /// Bytes written so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True once the destination is full
    pub fn is_full(&self) -> bool {
        self.offset >= self.dest.len()
    }
}

/// Stateful stereo pair reducer.
///
/// Pair parity for half-rate output is tracked across calls so chunk
/// boundaries do not shift which pairs are kept.
#[derive(Debug, Clone)]
pub struct SampleReducer {
    config: ConvertConfig,
    pair_index: u64,
}

impl SampleReducer {
    /// New reducer for `config`, starting at pair 0
    pub fn new(config: ConvertConfig) -> Self {
        SampleReducer {
            config,
            pair_index: 0,
        }
    }

    /// Restart pair counting for a new source
    pub fn reset(&mut self) {
        self.pair_index = 0;
    }

    /// Number of source pairs seen so far
    pub fn pairs_seen(&self) -> u64 {
        self.pair_index
    }

    /// Reduce one source pair into `out`
    #[inline]
    pub fn reduce_pair(&mut self, left: i16, right: i16, out: &mut PcmWriter<'_>) {
        let index = self.pair_index;
        self.pair_index += 1;

        if self.config.rate == RateMode::Half && index % 2 != 0 {
            return;
        }

        match self.config.channels {
            ChannelMode::Stereo => {
                out.push(left);
                out.push(right);
            }
            ChannelMode::Mono => {
                let mixed = (i32::from(left) + i32::from(right)) / 2;
                out.push(mixed as i16);
            }
        }
    }

    /// Reduce a slice of interleaved left/right samples; a trailing odd sample is ignored
    pub fn reduce(&mut self, interleaved: &[i16], out: &mut PcmWriter<'_>) {
        for pair in interleaved.chunks_exact(2) {
            self.reduce_pair(pair[0], pair[1], out);
        }
    }
}
