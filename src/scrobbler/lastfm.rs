// Last.fm scrobbler implementation
// Submissions go through rustfm-scrobble-proxy, catalogue lookups through the REST API

use super::error::{Provider, ScrobbleError};
use super::retry::{best_effort, retry, RetryPolicy};
use super::traits::ScrobbleClient;
use crate::song::{Song, TrackInfo};
use chrono::Utc;
use rustfm_scrobble_proxy::{Scrobble, Scrobbler};
use serde_json::Value;
use std::time::Duration;

pub const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Issue a GET against the Last.fm REST API and decode the JSON reply
pub(crate) fn api_get(params: &[(&str, &str)]) -> Result<Value, ScrobbleError> {
    let mut request = attohttpc::get(API_ROOT)
        .param("format", "json")
        .timeout(REQUEST_TIMEOUT);
    for (key, value) in params {
        request = request.param(key, value);
    }

    let response = request.send()?;
    let status = response.status();
    let body = response.text()?;

    match parse_response(&body) {
        Err(ScrobbleError::Network(_)) if !status.is_success() => Err(ScrobbleError::Network(
            format!("Last.fm returned HTTP {}", status),
        )),
        other => other,
    }
}

/// Decode a reply body, turning `{"error": N}` payloads into typed errors
pub(crate) fn parse_response(body: &str) -> Result<Value, ScrobbleError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ScrobbleError::Network(format!("Malformed Last.fm response: {}", e)))?;

    if let Some(code) = value.get("error").and_then(Value::as_i64) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(ScrobbleError::from_lastfm_code(code, message));
    }

    Ok(value)
}

/// `track.getInfo` reports milliseconds, sometimes as a string
fn track_duration(value: &Value) -> u64 {
    let duration = &value["track"]["duration"];
    let millis = duration
        .as_u64()
        .or_else(|| duration.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0);
    millis / 1000
}

/// `(title, artist)` from a `track.getCorrection` reply
fn track_correction(value: &Value) -> Option<(String, String)> {
    let track = value.get("corrections")?.get("correction")?.get("track")?;
    let title = track["name"].as_str().unwrap_or_default().trim().to_string();
    let artist = track["artist"]["name"]
        .as_str()
        .unwrap_or_default()
        .trim()
        .to_string();
    Some((title, artist))
}

/// Artist name from an `artist.getCorrection` reply
fn artist_correction(value: &Value) -> Option<String> {
    let artist = value.get("corrections")?.get("correction")?.get("artist")?;
    artist["name"].as_str().map(|name| name.trim().to_string())
}

fn replace_if_present(field: &mut String, correction: String) {
    if !correction.is_empty() {
        *field = correction;
    }
}

fn album_of(track: &TrackInfo) -> Option<&str> {
    Some(track.album.as_str()).filter(|album| !album.is_empty())
}

pub struct LastFmScrobbler {
    api_key: String,
    scrobbler: Scrobbler,
    retry: RetryPolicy,
}

impl LastFmScrobbler {
    pub fn new(api_key: &str, api_secret: &str, session_key: &str, retry: RetryPolicy) -> Self {
        let mut scrobbler = Scrobbler::new(api_key, api_secret);
        scrobbler.authenticate_with_session_key(session_key);

        Self {
            api_key: api_key.to_string(),
            scrobbler,
            retry,
        }
    }

    /// Run one catalogue method; lookups that fail for any reason but
    /// credentials come back as `None`
    fn lookup(&self, method: &str, params: &[(&str, &str)]) -> Result<Option<Value>, ScrobbleError> {
        let mut all = vec![("method", method), ("api_key", self.api_key.as_str())];
        all.extend_from_slice(params);

        match retry(&self.retry, method, || api_get(&all)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_auth() => Err(err),
            Err(err) => {
                log::debug!("Last.fm {} lookup failed: {}", method, err);
                Ok(None)
            }
        }
    }
}

impl ScrobbleClient for LastFmScrobbler {
    fn update_metadata(&self, song: &mut Song) -> Result<(), ScrobbleError> {
        let artist = song.metadata.artist.clone();
        let title = song.metadata.title.clone();

        if let Some(value) = self.lookup("track.getCorrection", &[("artist", artist.as_str()), ("track", title.as_str())])? {
            if let Some((corrected_title, corrected_artist)) = track_correction(&value) {
                replace_if_present(&mut song.metadata.title, corrected_title);
                replace_if_present(&mut song.metadata.artist, corrected_artist);
            }
        }

        if let Some(value) = self.lookup("artist.getCorrection", &[("artist", artist.as_str())])? {
            if let Some(corrected_artist) = artist_correction(&value) {
                replace_if_present(&mut song.metadata.artist, corrected_artist);
            }
        }

        if song.metadata.duration == 0 {
            let artist = song.metadata.artist.clone();
            let title = song.metadata.title.clone();
            if let Some(value) = self.lookup("track.getInfo", &[("artist", artist.as_str()), ("track", title.as_str())])? {
                let duration = track_duration(&value);
                if duration > 0 {
                    log::debug!("Last.fm duration for {}: {}s", song, duration);
                    song.metadata.duration = duration;
                }
            }
        }

        Ok(())
    }

    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError> {
        let track = &song.state.track;
        let scrobble = Scrobble::new(&track.artist, &track.title, album_of(track));

        let result = retry(&self.retry, "Last.fm now playing", || {
            self.scrobbler
                .now_playing(&scrobble)
                .map(|_| ())
                .map_err(|e| ScrobbleError::from_message(Provider::LastFm, e.to_string()))
        });
        if result.is_ok() {
            log::info!("Last.fm: Now playing updated");
        }

        best_effort("Last.fm now playing", result)
    }

    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError> {
        let track = &song.state.track;
        let timestamp = song
            .state
            .started_playing_timestamp
            .unwrap_or_else(|| Utc::now().timestamp());

        let mut scrobble = Scrobble::new(&track.artist, &track.title, album_of(track));
        scrobble.with_timestamp(timestamp as u64);

        let result = retry(&self.retry, "Last.fm scrobble", || {
            self.scrobbler
                .scrobble(&scrobble)
                .map(|_| ())
                .map_err(|e| ScrobbleError::from_message(Provider::LastFm, e.to_string()))
        });
        if result.is_ok() {
            log::info!("Last.fm: Scrobbled successfully");
        }

        best_effort("Last.fm scrobble", result)
    }
}
