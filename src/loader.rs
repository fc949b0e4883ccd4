//! Track loading
//!
//! Turns resolved [`TrackSource`]s into a [`Playlist`]: each track file is
//! converted to the configured output format and its companion `.kmd` lyric
//! file, if any, is parsed alongside. A failure on any track drops everything
//! loaded so far.

pub use crate::convert::LoadProgress;

use crate::alloc::BulkAllocator;
use crate::config::PlayerConfig;
use crate::convert::{FormatConverter, SourceKind};
use crate::decoder::Decoder;
use crate::keys::KeySense;
use crate::lyrics::{LyricError, LyricTrack};
use crate::playlist::{Playlist, Track};
use crate::{PlayerError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Extension of companion lyric files
pub const LYRIC_EXTENSION: &str = "kmd";

/// A track file with its resolved encoding and lyric companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSource {
    /// Track file
    pub path: PathBuf,
    /// Encoding of the track file
    pub kind: SourceKind,
    /// Lyric file to try, if any
    pub lyrics: Option<PathBuf>,
}

impl TrackSource {
    /// Resolve a track path by extension; the lyric file is the same path with `.kmd`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let kind = SourceKind::from_path(path).ok_or_else(|| PlayerError::TrackLoad {
            path: path.display().to_string(),
            reason: "not a .s44 or .a44 data file".into(),
        })?;
        Ok(TrackSource {
            path: path.to_path_buf(),
            kind,
            lyrics: Some(path.with_extension(LYRIC_EXTENSION)),
        })
    }

    /// Display name used in progress output
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Loads and converts every track of a playlist
pub struct TrackLoader<'a> {
    config: &'a PlayerConfig,
    allocator: &'a dyn BulkAllocator,
    keys: &'a dyn KeySense,
    decoder: Option<Box<dyn Decoder>>,
}

impl<'a> TrackLoader<'a> {
    /// Loader using `config`, drawing memory from `allocator` and polling `keys` for cancel
    pub fn new(
        config: &'a PlayerConfig,
        allocator: &'a dyn BulkAllocator,
        keys: &'a dyn KeySense,
    ) -> Self {
        TrackLoader {
            config,
            allocator,
            keys,
            decoder: None,
        }
    }

    /// Decoder for compressed sources
    pub fn with_decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Load every source in order.
    ///
    /// `progress` is called after each converted chunk. On error, tracks
    /// loaded so far are released before returning.
    pub fn load_all(
        &mut self,
        sources: &[TrackSource],
        progress: &mut dyn FnMut(&TrackSource, LoadProgress),
    ) -> Result<Playlist> {
        Playlist::check_capacity(sources.len())?;

        let mut converter =
            FormatConverter::new(self.config.conversion, self.allocator, self.config.chunk_units)?;
        if let Some(decoder) = self.decoder.take() {
            converter = converter.with_decoder(decoder);
        }

        let mut playlist = Playlist::new(self.config.shuffle, self.config.quiet);
        for source in sources {
            match self.load_track(&mut converter, source, progress) {
                Ok(track) => {
                    playlist.push(track)?;
                }
                Err(e) => {
                    if !playlist.is_empty() {
                        tracing::info!(
                            tracks = playlist.len(),
                            bytes = playlist.total_bytes(),
                            "releasing loaded tracks"
                        );
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            tracks = playlist.len(),
            bytes = playlist.total_bytes(),
            "playlist loaded"
        );
        Ok(playlist)
    }

    /// Load one source with an existing converter
    pub fn load_track(
        &self,
        converter: &mut FormatConverter<'_>,
        source: &TrackSource,
        progress: &mut dyn FnMut(&TrackSource, LoadProgress),
    ) -> Result<Track> {
        let track_error = |reason: String| PlayerError::TrackLoad {
            path: source.name(),
            reason,
        };

        let file = File::open(&source.path).map_err(|e| track_error(format!("file open error: {e}")))?;
        let len = file
            .metadata()
            .map_err(|e| track_error(e.to_string()))?
            .len();
        let len = usize::try_from(len).map_err(|_| track_error("file too large".into()))?;

        tracing::debug!(path = %source.path.display(), len, kind = ?source.kind, "loading track");

        let buffer = converter.convert(
            BufReader::new(file),
            source.kind,
            len,
            self.keys,
            &mut |p| progress(source, p),
        )?;

        let lyrics = source.lyrics.as_deref().and_then(load_lyrics);
        Ok(Track::new(source.path.clone(), buffer, self.config.volume, lyrics))
    }
}

/// Parse a lyric file; a missing or malformed file leaves the track without lyrics
fn load_lyrics(path: &Path) -> Option<LyricTrack> {
    match LyricTrack::open(path) {
        Ok(lyrics) => {
            tracing::debug!(path = %path.display(), events = lyrics.len(), "lyrics loaded");
            Some(lyrics)
        }
        Err(LyricError::Missing(_)) => {
            tracing::debug!(path = %path.display(), "no lyric file");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring lyric file");
            None
        }
    }
}
