// ListenBrainz mirror
// API Documentation: https://listenbrainz.readthedocs.io/

use super::error::{Provider, ScrobbleError};
use super::retry::{best_effort, retry, RetryPolicy};
use super::traits::ScrobbleClient;
use crate::song::{Song, TrackInfo};
use anyhow::{Context, Result};
use chrono::Utc;
use listenbrainz::ListenBrainz;

pub const DEFAULT_API_URL: &str = "https://api.listenbrainz.org";

/// Receives the same now-playing and scrobble calls as Last.fm.
/// Catalogue corrections are left to Last.fm.
pub struct ListenBrainzScrobbler {
    name: String,
    client: ListenBrainz,
    retry: RetryPolicy,
}

impl ListenBrainzScrobbler {
    pub fn new(name: String, token: &str, api_url: &str, retry: RetryPolicy) -> Result<Self> {
        let mut client = if api_url == DEFAULT_API_URL {
            ListenBrainz::new()
        } else {
            ListenBrainz::new_with_url(api_url)
        };

        client
            .authenticate(token)
            .with_context(|| format!("Failed to authenticate with ListenBrainz ({})", name))?;

        Ok(Self { name, client, retry })
    }

    fn provider(&self) -> Provider {
        Provider::ListenBrainz(self.name.clone())
    }
}

fn release_of(track: &TrackInfo) -> Option<&str> {
    Some(track.album.as_str()).filter(|album| !album.is_empty())
}

impl ScrobbleClient for ListenBrainzScrobbler {
    fn update_metadata(&self, _song: &mut Song) -> Result<(), ScrobbleError> {
        Ok(())
    }

    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError> {
        let track = &song.state.track;
        log::debug!(
            "Sending now playing to ListenBrainz ({}): {} - {}",
            self.name,
            track.artist,
            track.title
        );

        let label = format!("ListenBrainz ({}) now playing", self.name);
        let result = retry(&self.retry, &label, || {
            self.client
                .playing_now(&track.artist, &track.title, release_of(track))
                .map_err(|e| ScrobbleError::from_message(self.provider(), e.to_string()))
        });
        if result.is_ok() {
            log::info!("ListenBrainz ({}): Now playing updated", self.name);
        }

        best_effort(&label, result)
    }

    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError> {
        let track = &song.state.track;
        let listened_at = song
            .state
            .started_playing_timestamp
            .unwrap_or_else(|| Utc::now().timestamp());

        let label = format!("ListenBrainz ({}) scrobble", self.name);
        let result = retry(&self.retry, &label, || {
            self.client
                .import(&track.artist, &track.title, release_of(track), listened_at)
                .map_err(|e| ScrobbleError::from_message(self.provider(), e.to_string()))
        });
        if result.is_ok() {
            log::info!("ListenBrainz ({}): Scrobbled successfully", self.name);
        }

        best_effort(&label, result)
    }
}
