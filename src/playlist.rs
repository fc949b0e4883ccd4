//! Track arena
//!
//! A [`Playlist`] is built once while loading and handed to the scheduler,
//! which never mutates it. Tracks are addressed by [`TrackId`].

use crate::convert::PcmBuffer;
use crate::display::banner_text;
use crate::lyrics::LyricTrack;
use crate::{PlayerError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum number of tracks in a playlist
pub const MAX_TRACKS: usize = 32;

/// Index of a track within its playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(usize);

impl TrackId {
    /// Position in the playlist
    pub fn index(self) -> usize {
        self.0
    }
}

/// A loaded, ready-to-play track
#[derive(Debug)]
pub struct Track {
    path: PathBuf,
    buffer: Arc<PcmBuffer>,
    duration_ms: u32,
    volume: u8,
    lyrics: Option<LyricTrack>,
    banner: String,
}

impl Track {
    /// Assemble a track; duration and banner text are derived here
    pub fn new(path: PathBuf, buffer: PcmBuffer, volume: u8, lyrics: Option<LyricTrack>) -> Self {
        let duration_ms = buffer.duration_ms();
        let banner = banner_text(&path, lyrics.as_ref());
        Track {
            path,
            buffer: Arc::new(buffer),
            duration_ms,
            volume,
            lyrics,
            banner,
        }
    }

    /// Source file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle to the converted audio
    pub fn buffer(&self) -> &Arc<PcmBuffer> {
        &self.buffer
    }

    /// Playing time in milliseconds
    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    /// Device volume (1..=15)
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Lyrics, if a lyric file was found and parsed
    pub fn lyrics(&self) -> Option<&LyricTrack> {
        self.lyrics.as_ref()
    }

    /// Precomputed now-playing text
    pub fn banner(&self) -> &str {
        &self.banner
    }
}

/// Fixed-capacity ordered set of tracks plus playback flags
#[derive(Debug)]
pub struct Playlist {
    tracks: Vec<Track>,
    shuffle: bool,
    quiet: bool,
}

impl Playlist {
    /// Empty playlist
    pub fn new(shuffle: bool, quiet: bool) -> Self {
        Playlist {
            tracks: Vec::with_capacity(MAX_TRACKS),
            shuffle,
            quiet,
        }
    }

    /// Reject a track count the playlist cannot hold
    pub fn check_capacity(count: usize) -> Result<()> {
        if count > MAX_TRACKS {
            return Err(PlayerError::ConfigError(format!(
                "too many tracks ({count}, at most {MAX_TRACKS})"
            )));
        }
        Ok(())
    }

    /// Append a track
    pub fn push(&mut self, track: Track) -> Result<TrackId> {
        if self.tracks.len() >= MAX_TRACKS {
            return Err(PlayerError::ConfigError(format!(
                "too many tracks (at most {MAX_TRACKS})"
            )));
        }
        self.tracks.push(track);
        Ok(TrackId(self.tracks.len() - 1))
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if no track was loaded
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track by id
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0)
    }

    /// Id of the track at `index`, if in range
    pub fn id_at(&self, index: usize) -> Option<TrackId> {
        (index < self.tracks.len()).then_some(TrackId(index))
    }

    /// Tracks in playlist order
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Whether the next track is chosen at random
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Whether display output is suppressed
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Total bytes held by converted buffers
    pub fn total_bytes(&self) -> usize {
        self.tracks.iter().map(|t| t.buffer.byte_len()).sum()
    }
}

/// Read an indirect playlist: one path per line, blank lines and `#` comments skipped
pub fn read_indirect<R: BufRead>(reader: R) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        paths.push(PathBuf::from(entry));
    }
    Ok(paths)
}

/// Read an indirect playlist from disk
pub fn read_indirect_file<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PlayerError::TrackLoad {
        path: path.display().to_string(),
        reason: format!("cannot open playlist: {e}"),
    })?;
    read_indirect(BufReader::new(file))
}
