// Metadata enrichment
// Fills in what the desktop observation is missing before a song gets tracked

use crate::scrobbler::{ScrobbleClient, ScrobbleError};
use crate::song::Song;
use crate::web::WebSource;

/// Duration assumed when no source knows the track
pub const DEFAULT_DURATION: u64 = 120;

/// Complete a new song's metadata.
///
/// Duration priority: player, web, scrobbling service, then
/// [`DEFAULT_DURATION`]. A player duration is never replaced. Lookups fail
/// silently; only a credential failure from the scrobbling service is returned.
pub fn enrich<W, R>(song: &mut Song, web: &W, remote: &R, include_artwork: bool) -> Result<(), ScrobbleError>
where
    W: WebSource + ?Sized,
    R: ScrobbleClient + ?Sized,
{
    let app_duration = song
        .metadata
        .is_app_duration
        .then_some(song.metadata.duration);

    if app_duration.is_none() || include_artwork {
        web.update_metadata(song, include_artwork);
        keep_app_duration(song, app_duration);
    }

    remote.update_metadata(song)?;
    keep_app_duration(song, app_duration);

    if song.metadata.duration == 0 {
        log::debug!("No duration known for {}, assuming {}s", song, DEFAULT_DURATION);
        song.metadata.duration = DEFAULT_DURATION;
    }

    Ok(())
}

fn keep_app_duration(song: &mut Song, app_duration: Option<u64>) {
    if let Some(duration) = app_duration {
        song.metadata.duration = duration;
        song.metadata.is_app_duration = true;
    }
}
