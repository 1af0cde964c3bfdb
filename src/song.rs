// Song state model
// Holds the latest observation and the committed tracking state for one song

use std::fmt;

/// Album artwork fetched for the current song.
#[derive(Clone, PartialEq, Eq)]
pub struct Artwork {
    pub url: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artwork")
            .field("url", &self.url)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Track fields shared by the raw observation and the tracked state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    /// Identity key, `"artist - title"`
    pub id: String,
    pub album: String,
    pub artwork: Option<Artwork>,
    /// Duration in seconds, 0 when unknown
    pub duration: u64,
    /// Duration came from the desktop player itself
    pub is_app_duration: bool,
    pub playing: bool,
}

impl TrackInfo {
    /// Build the identity key for an artist/title pair
    pub fn make_id(artist: &str, title: &str) -> String {
        format!("{} - {}", artist, title)
    }
}

/// Committed tracking record used for scrobble decisions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackState {
    pub track: TrackInfo,
    /// Accumulated listening time in seconds
    pub playtime: f64,
    /// A start timestamp has been recorded for the current listen
    pub started_playing: bool,
    /// Epoch seconds reported as the scrobble time
    pub started_playing_timestamp: Option<i64>,
    /// Epoch seconds of the last tick the song was seen playing
    pub last_time_played: Option<f64>,
}

/// The single song tracked by the engine.
///
/// `metadata` is overwritten by every observation; `state` only changes through
/// the engine's transitions.
#[derive(Debug, Clone, Default)]
pub struct Song {
    pub metadata: TrackInfo,
    pub state: TrackState,
}

impl Song {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_metadata(&mut self) {
        self.metadata = TrackInfo::default();
    }

    pub fn reset_state(&mut self) {
        self.state = TrackState::default();
    }

    /// Copy the (enriched) observation into the tracked state
    pub fn commit_metadata(&mut self) {
        self.state.track = self.metadata.clone();
    }

    /// True when the observation is the song being tracked.
    ///
    /// Two empty ids compare equal: neither side has a song.
    pub fn is_same_song(&self) -> bool {
        self.metadata.id == self.state.track.id
    }

    /// Played for at least half of the duration (integer halving, inclusive)
    pub fn is_scrobble_eligible(&self) -> bool {
        !self.state.track.id.is_empty()
            && self.state.playtime >= (self.state.track.duration / 2) as f64
    }

    /// Played past the full duration, trusted only for player-reported durations
    pub fn is_rescrobble_eligible(&self) -> bool {
        self.state.track.is_app_duration && self.state.playtime > self.state.track.duration as f64
    }

    /// Add the time since the last playing tick. No-op while paused.
    pub fn accrue_playtime(&mut self, now: f64) {
        if let Some(last) = self.state.last_time_played {
            self.state.playtime += (now - last).max(0.0);
        }
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metadata.id)
    }
}
