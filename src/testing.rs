// Test doubles for the engine's collaborators

use crate::player::{apply_observation, PlayerSource};
use crate::scrobbler::{ScrobbleClient, ScrobbleError};
use crate::song::{Artwork, Song};
use crate::web::WebSource;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

pub const ARTIST: &str = "Artist";

/// A song whose metadata holds a fresh desktop observation
pub fn observed(title: &str, artist: &str, playing: bool, app_duration: u64) -> Song {
    let mut song = Song::new();
    apply_observation(&mut song, title, artist, "", playing, app_duration);
    song
}

/// Id the scripted player derives for `title`
pub fn id_of(title: &str) -> String {
    format!("{} - {}", ARTIST, title)
}

/// One observation of the desktop player
#[derive(Debug, Clone)]
pub struct Frame {
    title: String,
    playing: bool,
    duration: u64,
}

impl Frame {
    pub fn playing(title: &str, app_duration: u64) -> Self {
        Self {
            title: title.to_string(),
            playing: true,
            duration: app_duration,
        }
    }

    pub fn paused(title: &str, app_duration: u64) -> Self {
        Self {
            playing: false,
            ..Self::playing(title, app_duration)
        }
    }
}

/// Plays back a fixed list of observations, repeating the last one
#[derive(Debug, Default)]
pub struct ScriptedPlayer {
    frames: VecDeque<Option<Frame>>,
    last: Option<Frame>,
}

impl ScriptedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, frame: Frame, ticks: usize) -> Self {
        self.frames.extend(std::iter::repeat(Some(frame)).take(ticks));
        self
    }

    pub fn then_absent(mut self, ticks: usize) -> Self {
        self.frames.extend(std::iter::repeat(None).take(ticks));
        self
    }
}

impl PlayerSource for ScriptedPlayer {
    fn update_metadata(&mut self, song: &mut Song) -> bool {
        let frame = match self.frames.pop_front() {
            Some(frame) => frame,
            None => self.last.clone(),
        };
        self.last = frame.clone();

        match frame {
            Some(frame) => {
                apply_observation(song, &frame.title, ARTIST, "Album", frame.playing, frame.duration);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Lookup(String),
    NowPlaying(String),
    /// Song id and reported start timestamp
    Scrobble(String, Option<i64>),
}

/// Scrobbling client that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingClient {
    calls: Arc<Mutex<Vec<Call>>>,
    lookup_duration: Option<u64>,
    overwrite_duration: bool,
    correction: Option<(String, String)>,
    fail: Option<ScrobbleError>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup_duration(mut self, duration: u64) -> Self {
        self.lookup_duration = Some(duration);
        self
    }

    /// Ignore the "only fill a missing duration" rule
    pub fn overwriting_duration(mut self) -> Self {
        self.overwrite_duration = true;
        self
    }

    pub fn with_correction(mut self, title: &str, artist: &str) -> Self {
        self.correction = Some((title.to_string(), artist.to_string()));
        self
    }

    pub fn failing_with(mut self, err: ScrobbleError) -> Self {
        self.fail = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than catalogue lookups
    pub fn signals(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Lookup(_)))
            .collect()
    }

    pub fn scrobbles(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Scrobble(..)))
            .collect()
    }

    pub fn now_playing_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::NowPlaying(_)))
            .count()
    }

    fn record(&self, call: Call) -> Result<(), ScrobbleError> {
        self.calls.lock().unwrap().push(call);
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ScrobbleClient for RecordingClient {
    fn update_metadata(&self, song: &mut Song) -> Result<(), ScrobbleError> {
        self.record(Call::Lookup(song.metadata.id.clone()))?;

        if let Some((title, artist)) = &self.correction {
            song.metadata.title = title.clone();
            song.metadata.artist = artist.clone();
        }
        if let Some(duration) = self.lookup_duration {
            if self.overwrite_duration || song.metadata.duration == 0 {
                song.metadata.duration = duration;
            }
        }
        Ok(())
    }

    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError> {
        self.record(Call::NowPlaying(song.state.track.id.clone()))
    }

    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError> {
        self.record(Call::Scrobble(
            song.state.track.id.clone(),
            song.state.started_playing_timestamp,
        ))
    }
}

/// Web source with canned answers
#[derive(Debug, Clone, Default)]
pub struct FakeWeb {
    duration: Option<u64>,
    artwork: bool,
    ignore_app_duration: bool,
    lookups: Rc<Cell<usize>>,
}

impl FakeWeb {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: u64) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn with_artwork(mut self) -> Self {
        self.artwork = true;
        self
    }

    pub fn ignoring_app_duration(mut self) -> Self {
        self.ignore_app_duration = true;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl WebSource for FakeWeb {
    fn update_metadata(&self, song: &mut Song, include_artwork: bool) {
        self.lookups.set(self.lookups.get() + 1);

        if let Some(duration) = self.duration {
            if self.ignore_app_duration || !song.metadata.is_app_duration {
                song.metadata.duration = duration;
                song.metadata.is_app_duration = false;
            }
        }
        if include_artwork && self.artwork {
            song.metadata.artwork = Some(Artwork {
                url: "https://example.invalid/cover.jpg".into(),
                bytes: vec![0xff, 0xd8],
            });
        }
    }
}
