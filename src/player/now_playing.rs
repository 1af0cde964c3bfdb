// macOS now playing source
// Polls the system media remote for the Music app's current track

use super::{apply_observation, is_music_app, PlayerSource};
use crate::song::Song;
use media_remote::prelude::*;
use media_remote::NowPlayingInfo;
use std::time::Duration;

/// Reads the track the system reports as now playing
pub struct NowPlayingSource {
    now_playing: NowPlayingJXA,
}

impl NowPlayingSource {
    pub fn new() -> Self {
        Self {
            now_playing: NowPlayingJXA::new(Duration::from_secs(30)),
        }
    }

    fn current_info(&self) -> Option<NowPlayingInfo> {
        // Clone media info to avoid holding the guard
        let guard = self.now_playing.get_info();
        guard.as_ref().cloned()
    }
}

impl Default for NowPlayingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerSource for NowPlayingSource {
    fn update_metadata(&mut self, song: &mut Song) -> bool {
        let Some(info) = self.current_info() else {
            return false;
        };

        if !is_music_app(info.bundle_id.as_deref()) {
            log::trace!("Ignoring now playing info from {:?}", info.bundle_id);
            return false;
        }

        let (Some(title), Some(artist)) = (info.title.as_deref(), info.artist.as_deref()) else {
            log::debug!("Now playing info without title or artist");
            return false;
        };

        let album = info.album.as_deref().unwrap_or_default();
        let playing = info.is_playing.unwrap_or(false);
        let duration = info.duration.map(|d| d as u64).unwrap_or(0);

        apply_observation(song, title, artist, album, playing, duration);
        true
    }
}
