// Desktop player observation

#[cfg(target_os = "macos")]
pub mod now_playing;

use crate::song::Song;

/// Bundle identifier of the Music app
#[cfg(any(target_os = "macos", test))]
pub const MUSIC_BUNDLE_ID: &str = "com.apple.Music";

/// Only the Music app counts as the player; other apps' now-playing info is ignored
#[cfg(any(target_os = "macos", test))]
pub fn is_music_app(bundle_id: Option<&str>) -> bool {
    bundle_id == Some(MUSIC_BUNDLE_ID)
}

/// Primary, authoritative source of what the desktop player shows.
pub trait PlayerSource {
    /// Overwrite `song.metadata` with the current observation.
    ///
    /// Returns `false` when the player, its window or any required element
    /// cannot be found. Never fails for a missing player.
    fn update_metadata(&mut self, song: &mut Song) -> bool;
}

impl<T: PlayerSource + ?Sized> PlayerSource for Box<T> {
    fn update_metadata(&mut self, song: &mut Song) -> bool {
        (**self).update_metadata(song)
    }
}

/// Apply one observation, keeping the player-reported duration sticky.
///
/// A song that is already observed keeps a duration it previously got from
/// the player when the current reading has none, and keeps its artwork.
pub fn apply_observation(
    song: &mut Song,
    title: &str,
    artist: &str,
    album: &str,
    playing: bool,
    duration: u64,
) {
    let id = crate::song::TrackInfo::make_id(artist, title);
    let metadata = &mut song.metadata;

    if metadata.id == id {
        if duration > 0 {
            metadata.duration = duration;
            metadata.is_app_duration = true;
        }
        metadata.playing = playing;
        return;
    }

    metadata.title = title.to_string();
    metadata.artist = artist.to_string();
    metadata.id = id;
    metadata.album = album.to_string();
    metadata.playing = playing;
    metadata.duration = duration;
    metadata.is_app_duration = duration > 0;
    metadata.artwork = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_song_replaces_observation() {
        let mut song = Song::new();
        song.metadata.artwork = Some(crate::song::Artwork {
            url: "old".into(),
            bytes: vec![1],
        });

        apply_observation(&mut song, "Song", "Artist", "Album", true, 0);

        assert_eq!(song.metadata.id, "Artist - Song");
        assert_eq!(song.metadata.album, "Album");
        assert!(song.metadata.playing);
        assert!(!song.metadata.is_app_duration);
        assert!(song.metadata.artwork.is_none());
    }

    #[test]
    fn test_only_music_app_counts() {
        assert!(is_music_app(Some("com.apple.Music")));
        assert!(!is_music_app(Some("com.spotify.client")));
        assert!(!is_music_app(Some("com.apple.Safari")));
        assert!(!is_music_app(None));
    }

    #[test]
    fn test_same_song_keeps_known_duration() {
        let mut song = Song::new();
        apply_observation(&mut song, "Song", "Artist", "Album", true, 215);
        assert!(song.metadata.is_app_duration);

        apply_observation(&mut song, "Song", "Artist", "Album", false, 0);
        assert_eq!(song.metadata.duration, 215);
        assert!(song.metadata.is_app_duration);
        assert!(!song.metadata.playing);
    }

    #[test]
    fn test_same_song_picks_up_late_duration() {
        let mut song = Song::new();
        apply_observation(&mut song, "Song", "Artist", "", true, 0);
        song.metadata.duration = 120;

        apply_observation(&mut song, "Song", "Artist", "", true, 187);
        assert_eq!(song.metadata.duration, 187);
        assert!(song.metadata.is_app_duration);
    }
}
