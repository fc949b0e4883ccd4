//! On-screen banner and lyric output
//!
//! The screen area is a status row followed by the lyric rows:
//!
//! ```text
//! row 0      ♪<banner>           (note glyph at column 0, banner at column 2)
//! rows 1..=3 lyric captions      (caption row 0..=2, column 0..=30)
//! ```

use crate::lyrics::{LyricEvent, LyricTrack, POS_Y_MAX, POS_Y_MIN};
use std::path::Path;

/// Row of the now-playing / paused / aborted indicator
pub const STATUS_ROW: u16 = 0;
/// Screen row of caption row 0
pub const LYRIC_ROW_BASE: u16 = 1;
/// Number of caption rows
pub const LYRIC_ROWS: u16 = (POS_Y_MAX - POS_Y_MIN + 1) as u16;
/// Total rows used on screen
pub const SCREEN_ROWS: u16 = LYRIC_ROW_BASE + LYRIC_ROWS;
/// Width of a caption row
pub const SCREEN_WIDTH: u16 = 96;

/// Note glyph leading the status row
pub const NOTE: &str = "\u{266a}";
/// Column of the banner text
pub const BANNER_COLUMN: u16 = 2;
/// Width of the banner text
pub const BANNER_WIDTH: u16 = 46;
/// Width of the whole status indicator
pub const STATUS_WIDTH: u16 = BANNER_COLUMN + BANNER_WIDTH;

const PAUSED: &str = "\u{266a}PAUSED";
const ABORTED: &str = "\u{266a}ABORTED";

/// Text output surface.
///
/// `put` writes `text` at `(row, column)` and blanks the rest of `width`
/// cells. It is called from the periodic tick and must not block.
pub trait Display: Send + Sync {
    /// Write `text` padded or cut to `width` cells
    fn put(&self, row: u16, column: u16, width: u16, text: &str);
}

/// Show the note glyph and the now-playing banner
pub fn show_now_playing(display: &dyn Display, banner: &str) {
    display.put(STATUS_ROW, 0, BANNER_COLUMN, NOTE);
    display.put(STATUS_ROW, BANNER_COLUMN, BANNER_WIDTH, banner);
}

/// Show the paused indicator
pub fn show_paused(display: &dyn Display) {
    display.put(STATUS_ROW, 0, STATUS_WIDTH, PAUSED);
}

/// Show the aborted indicator
pub fn show_aborted(display: &dyn Display) {
    display.put(STATUS_ROW, 0, STATUS_WIDTH, ABORTED);
}

/// Render a caption at its position
pub fn show_lyric(display: &dyn Display, event: &LyricEvent) {
    display.put(
        LYRIC_ROW_BASE + event.row,
        event.column,
        SCREEN_WIDTH.saturating_sub(event.column),
        &event.message,
    );
}

/// Blank every caption row
pub fn clear_lyrics(display: &dyn Display) {
    for row in 0..LYRIC_ROWS {
        display.put(LYRIC_ROW_BASE + row, 0, SCREEN_WIDTH, "");
    }
}

/// Now-playing text for a track.
///
/// Uses the lyric file's title and artist tags when present, otherwise the
/// track's file name.
pub fn banner_text(path: &Path, lyrics: Option<&LyricTrack>) -> String {
    if let Some(lyrics) = lyrics {
        match (lyrics.title(), lyrics.artist()) {
            ("", _) => {}
            (title, "") => return title.to_string(),
            (title, artist) => return format!("{title} / {artist}"),
        }
    }
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
