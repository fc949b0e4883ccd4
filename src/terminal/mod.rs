//! Terminal front-end
//!
//! [`ConsoleDisplay`] renders the status and caption rows in a block of lines
//! reserved below the cursor. [`TerminalKeys`] reads key events in raw mode
//! and latches the hot keys:
//! - `Ctrl+P` / `Ctrl+F4`: pause/resume
//! - `Ctrl+N` / `Ctrl+F5`: skip
//! - `Esc`: cancel loading
//! - `q` / `Ctrl+C`: quit

use crate::display::Display;
use crate::keys::{HotKeys, LatchedKeys};
use crate::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, queue, style, terminal};
use parking_lot::Mutex;
use std::io::{stdout, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

const BLANKS: &str = "                                                                                                                                ";

/// Display writing to a reserved block of terminal lines
pub struct ConsoleDisplay {
    origin: u16,
    out: Mutex<Stdout>,
}

impl ConsoleDisplay {
    /// Reserve `rows` lines below the cursor for the display
    pub fn new(rows: u16) -> Result<Self> {
        let mut out = stdout();
        for _ in 0..rows {
            out.write_all(b"\r\n")?;
        }
        out.flush()?;
        let (_, row) = cursor::position()?;
        Ok(ConsoleDisplay {
            origin: row.saturating_sub(rows),
            out: Mutex::new(out),
        })
    }
}

impl Display for ConsoleDisplay {
    fn put(&self, row: u16, column: u16, width: u16, text: &str) {
        let (text, pad) = fit(text, usize::from(width));
        let mut out = self.out.lock();
        let _ = queue!(
            out,
            cursor::SavePosition,
            cursor::MoveTo(column, self.origin + row),
            style::Print(text),
            style::Print(&BLANKS[..pad.min(BLANKS.len())]),
            cursor::RestorePosition
        );
        let _ = out.flush();
    }
}

/// Cut `text` to `width` characters; returns the text and the padding needed
fn fit(text: &str, width: usize) -> (&str, usize) {
    match text.char_indices().nth(width) {
        Some((cut, _)) => (&text[..cut], 0),
        None => (text, width - text.chars().count()),
    }
}

/// Raw-mode keyboard reader feeding a [`LatchedKeys`]
pub struct TerminalKeys {
    latch: Arc<LatchedKeys>,
}

impl TerminalKeys {
    /// Switch the terminal to raw mode; restored on drop
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(TerminalKeys {
            latch: Arc::new(LatchedKeys::new()),
        })
    }

    /// Latch shared with the loader and scheduler
    pub fn latch(&self) -> Arc<LatchedKeys> {
        Arc::clone(&self.latch)
    }

    /// Drain pending key events, waiting up to `timeout` for the first one
    pub fn pump(&self, timeout: Duration) -> Result<()> {
        let mut wait = timeout;
        while event::poll(wait)? {
            if let Event::Key(key) = event::read()? {
                let keys = map_key(&key);
                if !keys.is_empty() {
                    self.latch.press(keys);
                }
            }
            wait = Duration::ZERO;
        }
        Ok(())
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Hot keys for a key event
pub fn map_key(key: &KeyEvent) -> HotKeys {
    if key.kind != KeyEventKind::Press {
        return HotKeys::empty();
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('p' | 'P') | KeyCode::F(4) if ctrl => HotKeys::MODIFIER | HotKeys::PAUSE,
        KeyCode::Char('n' | 'N') | KeyCode::F(5) if ctrl => HotKeys::MODIFIER | HotKeys::SKIP,
        KeyCode::Char('c') if ctrl => HotKeys::CANCEL | HotKeys::QUIT,
        KeyCode::Esc => HotKeys::CANCEL,
        KeyCode::Char('q' | 'Q') => HotKeys::QUIT,
        _ => HotKeys::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_ctrl_hot_keys() {
        assert_eq!(
            map_key(&press(KeyCode::Char('p'), KeyModifiers::CONTROL)),
            HotKeys::MODIFIER | HotKeys::PAUSE
        );
        assert_eq!(
            map_key(&press(KeyCode::F(5), KeyModifiers::CONTROL)),
            HotKeys::MODIFIER | HotKeys::SKIP
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            HotKeys::CANCEL | HotKeys::QUIT
        );
    }

    #[test]
    fn test_plain_keys() {
        assert_eq!(map_key(&press(KeyCode::Char('p'), KeyModifiers::NONE)), HotKeys::empty());
        assert_eq!(map_key(&press(KeyCode::Esc, KeyModifiers::NONE)), HotKeys::CANCEL);
        assert_eq!(map_key(&press(KeyCode::Char('q'), KeyModifiers::NONE)), HotKeys::QUIT);
    }

    #[test]
    fn test_release_ignored() {
        let mut key = press(KeyCode::Char('p'), KeyModifiers::CONTROL);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(&key), HotKeys::empty());
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("abc", 5), ("abc", 2));
        assert_eq!(fit("abcdef", 3), ("abc", 0));
        assert_eq!(fit("\u{266a}PAUSED", 2), ("\u{266a}P", 0));
        assert_eq!(fit("", 4), ("", 4));
    }
}
