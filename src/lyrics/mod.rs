//! KMD Lyric Files
//!
//! Timed, positioned captions and track metadata parsed from the line-oriented
//! KMD text format:
//! - Header: `KMD100`
//! - Events: `x<col>,y<row>,s<mm>:<ss>:<cc>,e<mm>:<ss>:<cc>,"<text>"`
//! - Tags: events stamped `99:59:99` whose text starts with `TIT2:`, `TPE1:` or `TALB:`

pub mod parser;

pub use parser::{LyricParser, ParsedLine, TagKey, Timestamp};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Magic header expected on the first line
pub const KMD_MAGIC: &[u8; 6] = b"KMD100";
/// Leftmost caption column
pub const POS_X_MIN: i16 = 0;
/// Rightmost caption column
pub const POS_X_MAX: i16 = 30;
/// Topmost caption row
pub const POS_Y_MIN: i16 = 0;
/// Bottommost caption row
pub const POS_Y_MAX: i16 = 2;
/// Maximum caption/tag length in bytes
pub const MAX_MESSAGE_LEN: usize = 62;
/// Maximum line length in bytes; longer lines are truncated
pub const MAX_LINE_LEN: usize = 256;

/// Errors raised while opening or parsing a lyric file
#[derive(thiserror::Error, Debug)]
pub enum LyricError {
    /// The lyric file does not exist
    #[error("lyric file not found: {0}")]
    Missing(String),

    /// First line is not the `KMD100` magic
    #[error("missing KMD100 header")]
    BadHeader,

    /// Event storage could not be reserved
    #[error("event storage allocation failed ({0} events)")]
    OutOfMemory(usize),

    /// IO error while reading the stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single timed caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricEvent {
    /// Display column, clamped to `POS_X_MIN..=POS_X_MAX`
    pub column: u16,
    /// Display row, clamped to `POS_Y_MIN..=POS_Y_MAX`
    pub row: u16,
    /// Time the caption appears, relative to track start
    pub start_ms: u32,
    /// Time the caption is meant to disappear (not used for dispatch)
    pub end_ms: u32,
    /// Caption text, at most `MAX_MESSAGE_LEN` bytes
    pub message: String,
}

/// Parsed lyric file: ordered events, a read cursor and metadata tags
#[derive(Debug, Default)]
pub struct LyricTrack {
    events: Vec<LyricEvent>,
    cursor: AtomicUsize,
    title: String,
    artist: String,
    album: String,
}

impl LyricTrack {
    /// Open and parse a lyric file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LyricError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LyricError::Missing(path.display().to_string()),
            _ => LyricError::Io(e),
        })?;
        LyricParser::parse(BufReader::new(file))
    }

    pub(crate) fn from_parts(
        events: Vec<LyricEvent>,
        title: String,
        artist: String,
        album: String,
    ) -> Self {
        LyricTrack {
            events,
            cursor: AtomicUsize::new(0),
            title,
            artist,
            album,
        }
    }

    /// Number of playable events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the file carried no playable events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in file order
    pub fn events(&self) -> &[LyricEvent] {
        &self.events
    }

    /// `TIT2:` tag value (empty if absent)
    pub fn title(&self) -> &str {
        &self.title
    }

    /// `TPE1:` tag value (empty if absent)
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// `TALB:` tag value (empty if absent)
    pub fn album(&self) -> &str {
        &self.album
    }

    /// Index of the next unread event
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Rewind the cursor to the first event
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Release);
    }

    /// Pending event without advancing the cursor
    pub fn peek_event(&self) -> Option<&LyricEvent> {
        self.events.get(self.cursor())
    }

    /// Next event in stored order, advancing the cursor.
    ///
    /// Returns `None` once the cursor reaches the event count or after `close`.
    pub fn next_event(&self) -> Option<&LyricEvent> {
        let index = self.cursor();
        let event = self.events.get(index)?;
        self.cursor.store(index + 1, Ordering::Release);
        Some(event)
    }

    /// Release event storage. Safe to call more than once.
    pub fn close(&mut self) {
        self.events = Vec::new();
        self.reset();
    }
}
