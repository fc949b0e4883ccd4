//! Background PCM player with timed lyric overlay
//!
//! Preloads one or more 16-bit PCM tracks into memory, reduces them to the
//! configured output format, and plays them back-to-back through an audio
//! device while a fixed-period scheduler drives track advancement, hot-key
//! control and on-screen lyric captions parsed from companion KMD files.
//!
//! # Features
//! - KMD lyric/tag file parsing with two-pass sizing
//! - Channel, sample rate and bit depth reduction while loading
//! - YM2608 ADPCM source decoding
//! - Tick-driven scheduler with pause/resume/skip and abort detection
//! - Shuffle and quiet modes
//!
//! # Crate feature flags
//! - `terminal` (default): crossterm display and hot-key front-end (`terminal`)
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Parse a lyric file
//! ```no_run
//! use bgpcm::lyrics::LyricTrack;
//! let lyrics = LyricTrack::open("song.kmd").unwrap();
//! while let Some(event) = lyrics.next_event() {
//!     println!("{} {}", event.start_ms, event.message);
//! }
//! ```
//!
//! ## Convert a raw track
//! ```no_run
//! use bgpcm::alloc::HeapAllocator;
//! use bgpcm::convert::{ConvertConfig, FormatConverter, SourceKind};
//! use bgpcm::keys::LatchedKeys;
//! let allocator = HeapAllocator::unbounded();
//! let keys = LatchedKeys::new();
//! let mut converter = FormatConverter::new(ConvertConfig::default(), &allocator, 44_100 * 4).unwrap();
//! let file = std::fs::File::open("song.s44").unwrap();
//! let len = file.metadata().unwrap().len() as usize;
//! let buffer = converter
//!     .convert(file, SourceKind::Raw, len, &keys, &mut |_| {})
//!     .unwrap();
//! println!("{} bytes", buffer.byte_len());
//! ```

#![warn(missing_docs)]

pub mod alloc; // Bulk memory budget
pub mod config; // Player configuration
pub mod convert; // Format conversion pipeline
pub mod decoder; // Compressed source decoding
pub mod device; // Audio device abstraction
pub mod display; // On-screen banner and lyric output
pub mod keys; // Hot-key sense
pub mod loader; // Track loading
pub mod lyrics; // KMD lyric parsing
pub mod playlist; // Track arena
pub mod registry; // Running instance registry
pub mod scheduler; // Periodic playback scheduler
pub mod session; // Startup and teardown
#[cfg(feature = "terminal")]
pub mod terminal; // Terminal front-end

/// Program name used for instance registration and banners
pub const PROGRAM_NAME: &str = "bgpcm";

/// Error types for player operations
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// Lyric file could not be parsed
    #[error("Lyric error: {0}")]
    Lyric(#[from] lyrics::LyricError),

    /// Track file could not be loaded
    #[error("Track load error ({path}): {reason}")]
    TrackLoad {
        /// Offending track path
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Load was cancelled from the keyboard
    #[error("Canceled.")]
    Cancelled,

    /// Bulk allocation failed
    #[error("Memory allocation error: {requested} bytes requested, {available} available (out of memory?)")]
    OutOfMemory {
        /// Requested size in bytes
        requested: usize,
        /// Remaining budget in bytes
        available: usize,
    },

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Compressed source decoder error
    #[error("Decoder error: {0}")]
    DecoderError(String),

    /// Periodic timer could not be installed
    #[error("Timer install error: {0}")]
    TimerInstall(String),

    /// Instance registry error
    #[error("Instance registry error: {0}")]
    Registry(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for PlayerError {
    /// Converts a String into `PlayerError::Other`.
    ///
    /// Prefer the specific variants where the failure has a known category.
    fn from(msg: String) -> Self {
        PlayerError::Other(msg)
    }
}

impl From<&str> for PlayerError {
    /// Converts a string slice into `PlayerError::Other`.
    fn from(msg: &str) -> Self {
        PlayerError::Other(msg.to_string())
    }
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

// Public API exports
pub use alloc::{BulkAllocator, HeapAllocator, MemoryZone};
pub use config::PlayerConfig;
pub use convert::{ConvertConfig, FormatConverter, PcmBuffer, SourceKind};
pub use decoder::{Decoder, Ym2608Adpcm};
pub use device::{AudioDevice, PlayMode, PlayRequest};
pub use display::Display;
pub use keys::{HotKeys, KeySense, LatchedKeys};
pub use loader::{LoadProgress, TrackLoader, TrackSource};
pub use lyrics::{LyricEvent, LyricTrack};
pub use playlist::{Playlist, Track, TrackId};
pub use registry::{InstanceRegistry, PidFileRegistry};
pub use scheduler::{PlaybackScheduler, PlaybackState};
pub use session::Session;

#[cfg(feature = "streaming")]
pub use device::RodioDevice;
