//! KMD line parser
//!
//! Two passes over a seekable stream: the first counts candidate (`x`-prefixed)
//! lines to size event storage once, the second classifies each line as a
//! playable event or a metadata tag and fills the storage.

use super::{
    LyricError, LyricEvent, LyricTrack, KMD_MAGIC, MAX_LINE_LEN, MAX_MESSAGE_LEN, POS_X_MAX,
    POS_X_MIN, POS_Y_MAX, POS_Y_MIN,
};
use nom::bytes::complete::tag;
use nom::character::complete::{char, i16 as signed16, space0};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use std::io::{BufRead, Cursor, Read, Seek, SeekFrom};

/// `mm:ss:cc` timestamp as written in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Minutes
    pub minutes: i16,
    /// Seconds
    pub seconds: i16,
    /// Hundredths of a second
    pub centis: i16,
}

impl Timestamp {
    /// Timestamp marking a metadata line
    pub const SENTINEL: Timestamp = Timestamp {
        minutes: 99,
        seconds: 59,
        centis: 99,
    };

    /// Convert to milliseconds. Negative or out-of-range values yield `None`.
    pub fn to_ms(self) -> Option<u32> {
        let ms = i64::from(self.minutes) * 60_000
            + i64::from(self.seconds) * 1_000
            + i64::from(self.centis) * 10;
        u32::try_from(ms).ok()
    }
}

/// Recognized metadata keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey {
    /// `TIT2:`
    Title,
    /// `TPE1:`
    Artist,
    /// `TALB:`
    Album,
}

impl TagKey {
    const PREFIX_LEN: usize = 5;

    fn from_prefix(text: &[u8]) -> Option<Self> {
        match text.get(..Self::PREFIX_LEN)? {
            b"TIT2:" => Some(TagKey::Title),
            b"TPE1:" => Some(TagKey::Artist),
            b"TALB:" => Some(TagKey::Album),
            _ => None,
        }
    }
}

/// Classification of one candidate line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Playable caption
    Event(LyricEvent),
    /// Metadata line; `key` is `None` for unrecognized keys
    Tag {
        /// Recognized key
        key: Option<TagKey>,
        /// Value following the key, truncated to `MAX_MESSAGE_LEN`
        value: String,
    },
}

/// KMD file parser
pub struct LyricParser;

impl LyricParser {
    /// Parse a seekable lyric stream
    pub fn parse<R: BufRead + Seek>(mut reader: R) -> Result<LyricTrack, LyricError> {
        let mut line = Vec::with_capacity(MAX_LINE_LEN);

        if !read_line(&mut reader, &mut line)? || !line.starts_with(KMD_MAGIC) {
            return Err(LyricError::BadHeader);
        }

        // pass 1: upper bound on event count
        let mut candidates = 0usize;
        while read_line(&mut reader, &mut line)? {
            if line.first() == Some(&b'x') {
                candidates += 1;
            }
        }

        let mut events: Vec<LyricEvent> = Vec::new();
        events
            .try_reserve_exact(candidates)
            .map_err(|_| LyricError::OutOfMemory(candidates))?;

        // pass 2: fill
        let mut title = String::new();
        let mut artist = String::new();
        let mut album = String::new();

        reader.seek(SeekFrom::Start(0))?;
        while read_line(&mut reader, &mut line)? {
            match Self::parse_line(&line) {
                Some(ParsedLine::Event(event)) if events.len() < candidates => events.push(event),
                Some(ParsedLine::Tag {
                    key: Some(key),
                    value,
                }) => match key {
                    TagKey::Title => title = value,
                    TagKey::Artist => artist = value,
                    TagKey::Album => album = value,
                },
                _ => {}
            }
        }

        Ok(LyricTrack::from_parts(events, title, artist, album))
    }

    /// Parse an in-memory lyric file
    pub fn parse_bytes(data: &[u8]) -> Result<LyricTrack, LyricError> {
        Self::parse(Cursor::new(data))
    }

    /// Classify a single line. Returns `None` for lines that are not candidates
    /// or fail the field scan or quote check.
    pub fn parse_line(line: &[u8]) -> Option<ParsedLine> {
        let (_, (x, y, start, end)) = event_fields(line).ok()?;

        let open = line.iter().position(|&b| b == b'"')?;
        let close = line.iter().rposition(|&b| b == b'"')?;
        if open >= close {
            return None;
        }
        let text = &line[open + 1..close];

        if start == Timestamp::SENTINEL && end == Timestamp::SENTINEL {
            let key = TagKey::from_prefix(text);
            let value = match key {
                Some(_) => truncate_text(&text[TagKey::PREFIX_LEN..], MAX_MESSAGE_LEN),
                None => String::new(),
            };
            return Some(ParsedLine::Tag { key, value });
        }

        Some(ParsedLine::Event(LyricEvent {
            column: x.clamp(POS_X_MIN, POS_X_MAX) as u16,
            row: y.clamp(POS_Y_MIN, POS_Y_MAX) as u16,
            start_ms: start.to_ms()?,
            end_ms: end.to_ms()?,
            message: truncate_text(text, MAX_MESSAGE_LEN),
        }))
    }
}

/// Read one line without its terminator, capped at `MAX_LINE_LEN` bytes.
/// The rest of an overlong line is skipped without buffering it.
/// Returns false at end of stream.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> std::io::Result<bool> {
    line.clear();
    let read = Read::take(&mut *reader, MAX_LINE_LEN as u64).read_until(b'\n', line)?;
    if read == 0 {
        return Ok(false);
    }
    if line.last() != Some(&b'\n') && read == MAX_LINE_LEN {
        skip_line(reader)?;
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(true)
}

/// Discard input up to and including the next newline
fn skip_line<R: BufRead>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(at) => {
                reader.consume(at + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn number(input: &[u8]) -> IResult<&[u8], i16> {
    preceded(space0, signed16)(input)
}

fn timestamp(input: &[u8]) -> IResult<&[u8], Timestamp> {
    let (input, (minutes, seconds, centis)) = tuple((
        number,
        preceded(char(':'), number),
        preceded(char(':'), number),
    ))(input)?;
    Ok((
        input,
        Timestamp {
            minutes,
            seconds,
            centis,
        },
    ))
}

fn event_fields(input: &[u8]) -> IResult<&[u8], (i16, i16, Timestamp, Timestamp)> {
    tuple((
        preceded(char('x'), number),
        preceded(tag(",y"), number),
        preceded(tag(",s"), timestamp),
        preceded(tag(",e"), timestamp),
    ))(input)
}

/// Decode `bytes` (lossily for invalid UTF-8) and cut the text to at most
/// `max` bytes without splitting a character.
fn truncate_text(bytes: &[u8], max: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text
}
