//! YM2608 (OPNA) ADPCM-B decoder
//!
//! Each byte carries two 4-bit codes, high nibble first. Every code moves the
//! accumulator by `delta * (2 * magnitude + 1) / 8` and scales `delta` by a
//! per-code factor, clamped to `DELTA_MIN..=DELTA_MAX`.

use super::Decoder;
use crate::{PlayerError, Result};

const DELTA_MIN: i32 = 127;
const DELTA_MAX: i32 = 24_576;

/// Delta scale factors (out of 64) indexed by code magnitude
const STEP_SCALE: [i32; 8] = [57, 57, 57, 57, 77, 102, 128, 153];

/// Decoder state for one mono ADPCM stream
#[derive(Debug, Clone)]
pub struct Ym2608Adpcm {
    accumulator: i32,
    delta: i32,
    channels: u16,
    ready: bool,
}

impl Ym2608Adpcm {
    /// Decoder in its power-on state
    pub fn new() -> Self {
        Ym2608Adpcm {
            accumulator: 0,
            delta: DELTA_MIN,
            channels: 2,
            ready: false,
        }
    }

    fn reset(&mut self) {
        self.accumulator = 0;
        self.delta = DELTA_MIN;
    }

    /// Decode one 4-bit code
    #[inline]
    fn step(&mut self, code: u8) -> i16 {
        let magnitude = i32::from(code & 0x07);
        let diff = self.delta * (2 * magnitude + 1) / 8;
        self.accumulator = if code & 0x08 != 0 {
            self.accumulator - diff
        } else {
            self.accumulator + diff
        }
        .clamp(i32::from(i16::MIN), i32::from(i16::MAX));

        self.delta = (self.delta * STEP_SCALE[magnitude as usize] / 64).clamp(DELTA_MIN, DELTA_MAX);
        self.accumulator as i16
    }
}

impl Default for Ym2608Adpcm {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Ym2608Adpcm {
    fn init(&mut self, _capacity: usize, _rate: u32, channels: u16) -> Result<()> {
        if channels == 0 || channels > 2 {
            return Err(PlayerError::DecoderError(format!(
                "unsupported channel count {channels}"
            )));
        }
        self.reset();
        self.channels = channels;
        self.ready = true;
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> Result<usize> {
        if !self.ready {
            return Err(PlayerError::DecoderError("decoder not initialised".into()));
        }
        let channels = usize::from(self.channels);
        let needed = input.len() * 2 * channels;
        if needed > output.len() {
            return Err(PlayerError::DecoderError(format!(
                "output too small: {needed} samples needed, {} available",
                output.len()
            )));
        }

        let mut written = 0;
        for &byte in input {
            for code in [byte >> 4, byte & 0x0f] {
                let sample = self.step(code);
                for slot in &mut output[written..written + channels] {
                    *slot = sample;
                }
                written += channels;
            }
        }
        Ok(written)
    }

    fn close(&mut self) {
        self.reset();
        self.ready = false;
    }
}
