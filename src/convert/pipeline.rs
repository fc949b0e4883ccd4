//! Chunked load-and-convert pipeline

use super::{ConvertConfig, PcmBuffer, PcmWriter, SampleReducer, SourceKind};
use crate::alloc::{Block, BulkAllocator, MemoryZone};
use crate::decoder::{Decoder, EXPANSION_RATIO};
use crate::keys::KeySense;
use crate::{PlayerError, Result};
use std::io::{ErrorKind, Read};

/// Progress of a single track conversion, in 16-bit source sample units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    /// Units consumed so far
    pub processed: usize,
    /// Units the source expands to
    pub total: usize,
}

impl LoadProgress {
    /// Whether the whole source has been consumed
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Streams sources through a staging block into exact-size output buffers.
///
/// The staging block is taken from the allocator once and reused for every
/// track converted by this instance.
pub struct FormatConverter<'a> {
    config: ConvertConfig,
    allocator: &'a dyn BulkAllocator,
    staging: Block,
    chunk_units: usize,
    decoded: Vec<i16>,
    decoder: Option<Box<dyn Decoder>>,
}

impl<'a> FormatConverter<'a> {
    /// Create a converter reading `chunk_units` source sample units per chunk
    pub fn new(
        config: ConvertConfig,
        allocator: &'a dyn BulkAllocator,
        chunk_units: usize,
    ) -> Result<Self> {
        // Whole stereo pairs, and whole ADPCM bytes once divided by the expansion ratio
        let align = 2 * EXPANSION_RATIO;
        let chunk_units = chunk_units.max(align) / align * align;
        let staging = allocator.allocate(chunk_units * 2, MemoryZone::Main)?;

        Ok(FormatConverter {
            config,
            allocator,
            staging,
            chunk_units,
            decoded: Vec::new(),
            decoder: None,
        })
    }

    /// Attach a decoder for compressed sources
    pub fn with_decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Output format produced by this converter
    pub fn config(&self) -> ConvertConfig {
        self.config
    }

    /// Source sample units read per chunk
    pub fn chunk_units(&self) -> usize {
        self.chunk_units
    }

    /// Convert one source of `source_bytes` bytes.
    ///
    /// `keys` is polled before every chunk; a pending cancel aborts with
    /// [`PlayerError::Cancelled`] and releases the partial output.
    pub fn convert<R: Read>(
        &mut self,
        mut source: R,
        kind: SourceKind,
        source_bytes: usize,
        keys: &dyn KeySense,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<PcmBuffer> {
        let total = kind.source_units(source_bytes);
        let dest_bytes = self.config.dest_bytes(total);
        let mut block = self.allocator.allocate(dest_bytes, MemoryZone::High)?;

        if kind == SourceKind::Adpcm {
            self.prepare_decoder()?;
        }

        let result = self.fill_block(&mut source, kind, total, &mut block, keys, progress);

        if kind == SourceKind::Adpcm {
            if let Some(decoder) = self.decoder.as_mut() {
                decoder.close();
            }
        }

        let written = result?;
        tracing::debug!(
            total,
            dest_bytes,
            written,
            ?kind,
            "source converted"
        );
        Ok(PcmBuffer::new(self.config, block))
    }

    fn prepare_decoder(&mut self) -> Result<()> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| PlayerError::DecoderError("no decoder for compressed source".into()))?;
        if !decoder.is_available() {
            return Err(PlayerError::DecoderError("decoder unavailable".into()));
        }
        decoder.init(self.chunk_units, super::SOURCE_SAMPLE_RATE, 2)?;

        if self.decoded.len() < self.chunk_units {
            self.decoded
                .try_reserve_exact(self.chunk_units - self.decoded.len())
                .map_err(|_| PlayerError::OutOfMemory {
                    requested: self.chunk_units * 2,
                    available: self.allocator.available(),
                })?;
            self.decoded.resize(self.chunk_units, 0);
        }
        Ok(())
    }

    fn fill_block<R: Read>(
        &mut self,
        source: &mut R,
        kind: SourceKind,
        total: usize,
        block: &mut Block,
        keys: &dyn KeySense,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<usize> {
        let want = match kind {
            SourceKind::Raw => self.chunk_units * 2,
            SourceKind::Adpcm => self.chunk_units / EXPANSION_RATIO,
        };
        let mut writer = PcmWriter::new(block.as_mut_slice(), self.config.depth);
        let mut reducer = SampleReducer::new(self.config);
        let mut processed = 0usize;

        loop {
            if keys.cancel_requested() {
                return Err(PlayerError::Cancelled);
            }

            let staging = &mut self.staging.as_mut_slice()[..want];
            let read = read_chunk(source, staging)?;
            if read == 0 {
                break;
            }

            match kind {
                SourceKind::Raw => {
                    for pair in staging[..read].chunks_exact(4) {
                        let left = i16::from_be_bytes([pair[0], pair[1]]);
                        let right = i16::from_be_bytes([pair[2], pair[3]]);
                        reducer.reduce_pair(left, right, &mut writer);
                    }
                    processed += read / 2;
                }
                SourceKind::Adpcm => {
                    let decoder = self.decoder.as_mut().ok_or_else(|| {
                        PlayerError::DecoderError("no decoder for compressed source".into())
                    })?;
                    let samples = decoder.decode(&staging[..read], &mut self.decoded)?;
                    reducer.reduce(&self.decoded[..samples], &mut writer);
                    processed += samples;
                }
            }

            progress(LoadProgress {
                processed: processed.min(total),
                total,
            });

            if read < want {
                break;
            }
        }

        Ok(writer.offset())
    }
}

/// Read until `buf` is full or the source ends
fn read_chunk<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
