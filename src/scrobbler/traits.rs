// Common trait for scrobbling services

use super::error::ScrobbleError;
use crate::song::Song;

/// Remote scrobbling client as seen by the engine.
///
/// Implementations retry and swallow transient failures themselves. The only
/// error expected back is [`ScrobbleError::Auth`].
pub trait ScrobbleClient {
    /// Correct title/artist and fill a missing duration from the service's catalogue
    fn update_metadata(&self, song: &mut Song) -> Result<(), ScrobbleError>;

    /// Announce the tracked song as "now playing"
    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError>;

    /// Submit the tracked song, stamped with `state.started_playing_timestamp`
    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError>;
}

impl<T: ScrobbleClient + ?Sized> ScrobbleClient for &T {
    fn update_metadata(&self, song: &mut Song) -> Result<(), ScrobbleError> {
        (**self).update_metadata(song)
    }

    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError> {
        (**self).set_now_playing(song)
    }

    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError> {
        (**self).scrobble_song(song)
    }
}
