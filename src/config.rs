//! Player configuration
//!
//! Settings may come from a JSON file; command-line options are applied on
//! top by the binary. Missing fields take their defaults.

use crate::convert::ConvertConfig;
use crate::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default device volume
pub const DEFAULT_VOLUME: u8 = 8;
/// Lowest accepted volume
pub const MIN_VOLUME: u8 = 1;
/// Highest accepted volume
pub const MAX_VOLUME: u8 = 15;
/// Default scheduler tick period
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 10;
/// Default number of ticks per control/end-of-track cycle
pub const DEFAULT_CYCLE_TICKS: u32 = 16;
/// Captions starting earlier than this are discarded
pub const DEFAULT_LYRIC_GUARD_MS: u32 = 1000;
/// Shortest accepted lyric guard
pub const MIN_LYRIC_GUARD_MS: u32 = 500;
/// Longest accepted lyric guard
pub const MAX_LYRIC_GUARD_MS: u32 = 1000;
/// A track that stops this far before its end is treated as aborted
pub const DEFAULT_ABORT_MARGIN_MS: u32 = 1500;
/// Default conversion chunk, in 16-bit source sample units
pub const DEFAULT_CHUNK_UNITS: usize = 44_100 * 4;

/// Complete player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Device volume (1..=15)
    pub volume: u8,
    /// Output format
    pub conversion: ConvertConfig,
    /// Suppress banner and captions
    pub quiet: bool,
    /// Pick the next track at random
    pub shuffle: bool,
    /// Scheduler tick period in milliseconds
    pub tick_interval_ms: u32,
    /// Ticks per control/end-of-track cycle
    pub cycle_ticks: u32,
    /// Lyric guard in milliseconds
    pub lyric_guard_ms: u32,
    /// Abort detection margin in milliseconds
    pub abort_margin_ms: u32,
    /// Conversion chunk size in source sample units
    pub chunk_units: usize,
    /// Optional cap on bulk memory, in bytes
    pub memory_limit: Option<usize>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            volume: DEFAULT_VOLUME,
            conversion: ConvertConfig::default(),
            quiet: false,
            shuffle: false,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            cycle_ticks: DEFAULT_CYCLE_TICKS,
            lyric_guard_ms: DEFAULT_LYRIC_GUARD_MS,
            abort_margin_ms: DEFAULT_ABORT_MARGIN_MS,
            chunk_units: DEFAULT_CHUNK_UNITS,
            memory_limit: None,
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PlayerError::ConfigError(e.to_string()))
    }

    /// Load and validate a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PlayerError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.volume) {
            return Err(PlayerError::ConfigError(format!(
                "volume must be {MIN_VOLUME}-{MAX_VOLUME}, got {}",
                self.volume
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::ConfigError(
                "tick interval must be positive".into(),
            ));
        }
        if self.cycle_ticks == 0 {
            return Err(PlayerError::ConfigError("cycle length must be positive".into()));
        }
        if !(MIN_LYRIC_GUARD_MS..=MAX_LYRIC_GUARD_MS).contains(&self.lyric_guard_ms) {
            return Err(PlayerError::ConfigError(format!(
                "lyric guard must be {MIN_LYRIC_GUARD_MS}-{MAX_LYRIC_GUARD_MS} ms, got {}",
                self.lyric_guard_ms
            )));
        }
        if self.chunk_units == 0 {
            return Err(PlayerError::ConfigError("chunk size must be positive".into()));
        }
        Ok(())
    }
}
