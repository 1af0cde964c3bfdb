// Scrobble decision engine
// Polls the desktop player, tracks listening time and decides when to scrobble

use crate::clock::Clock;
use crate::enrichment;
use crate::player::PlayerSource;
use crate::scrobbler::{ScrobbleClient, ScrobbleError};
use crate::song::Song;
use crate::web::WebSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delay between two observations
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Delay after the player was not found
pub const NO_SONG_BACKOFF: Duration = Duration::from_secs(1);

/// How one observation was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Player or song not found
    NoSong,
    /// A different song than the tracked one
    NewSong,
    /// Tracked song, playing
    Playing,
    /// Tracked song, paused
    Paused,
}

impl Tick {
    /// How long to wait before the next observation
    pub fn delay(self) -> Duration {
        match self {
            Tick::NoSong => NO_SONG_BACKOFF,
            _ => POLL_INTERVAL,
        }
    }
}

/// Owns the tracked [`Song`] and drives it from one observation to the next.
///
/// Not re-entrant: every tick finishes its state changes and remote calls
/// before the next observation is read.
pub struct ScrobbleEngine<P, W, R, C> {
    song: Song,
    player: P,
    web: W,
    remote: R,
    clock: C,
    include_artwork: bool,
}

impl<P, W, R, C> ScrobbleEngine<P, W, R, C>
where
    P: PlayerSource,
    W: WebSource,
    R: ScrobbleClient,
    C: Clock,
{
    pub fn new(player: P, web: W, remote: R, clock: C, include_artwork: bool) -> Self {
        Self {
            song: Song::new(),
            player,
            web,
            remote,
            clock,
            include_artwork,
        }
    }

    #[cfg(test)]
    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Hand the song and the client back for the shutdown flush
    pub fn into_parts(self) -> (Song, R) {
        (self.song, self.remote)
    }

    /// Poll until `shutdown` is raised. Returns early only on credential failures.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), ScrobbleError> {
        log::info!("Watching the player");
        while !shutdown.load(Ordering::SeqCst) {
            let tick = self.tick()?;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.clock.sleep(tick.delay());
        }
        log::info!("Stopped watching the player");
        Ok(())
    }

    /// One tick followed by the matching pause
    #[cfg(test)]
    pub fn step(&mut self) -> Result<Tick, ScrobbleError> {
        let tick = self.tick()?;
        self.clock.sleep(tick.delay());
        Ok(tick)
    }

    /// Read one observation and apply it
    pub fn tick(&mut self) -> Result<Tick, ScrobbleError> {
        if !self.player.update_metadata(&mut self.song) {
            self.handle_no_song()?;
            return Ok(Tick::NoSong);
        }

        if !self.song.is_same_song() {
            self.handle_new_song()?;
            return Ok(Tick::NewSong);
        }

        self.refresh_app_duration();

        if self.song.metadata.playing {
            self.handle_playing()?;
            Ok(Tick::Playing)
        } else {
            self.handle_paused();
            Ok(Tick::Paused)
        }
    }

    fn handle_no_song(&mut self) -> Result<(), ScrobbleError> {
        if !self.song.state.track.id.is_empty() {
            log::info!("Player lost, last song: {}", self.song.state.track.id);
        }

        self.song.accrue_playtime(self.clock.now());
        if self.song.is_scrobble_eligible() {
            self.scrobble()?;
        }

        self.song.reset_metadata();
        self.song.reset_state();
        Ok(())
    }

    fn handle_new_song(&mut self) -> Result<(), ScrobbleError> {
        let now = self.clock.now();

        // The outgoing song is judged on its own state, including time up to now
        self.song.accrue_playtime(now);
        if self.song.is_scrobble_eligible() {
            self.scrobble()?;
        }
        self.song.reset_state();

        enrichment::enrich(&mut self.song, &self.web, &self.remote, self.include_artwork)?;
        self.song.commit_metadata();

        let track = &self.song.state.track;
        log::info!(
            "New track: {} ({}s{}, {})",
            track.id,
            track.duration,
            if track.is_app_duration { "" } else { " estimated" },
            if track.playing { "playing" } else { "paused" }
        );

        if self.song.metadata.playing {
            let state = &mut self.song.state;
            state.started_playing_timestamp = Some(now as i64);
            state.last_time_played = Some(now);
            state.started_playing = true;
            state.track.playing = true;
            self.set_now_playing()?;
        }

        Ok(())
    }

    fn handle_playing(&mut self) -> Result<(), ScrobbleError> {
        let now = self.clock.now();

        if !self.song.state.track.playing {
            log::info!("Resumed: {}", self.song.state.track.id);
            self.song.state.track.playing = true;
            self.set_now_playing()?;
        }

        if !self.song.state.started_playing {
            self.song.state.started_playing_timestamp = Some(now as i64);
            self.song.state.started_playing = true;
        }

        self.song.accrue_playtime(now);

        if self.song.is_rescrobble_eligible() {
            log::info!("Played again: {}", self.song.state.track.id);
            self.scrobble()?;
            self.song.state.playtime = 0.0;
            self.song.state.started_playing_timestamp = Some(now as i64);
            self.set_now_playing()?;
        }

        self.song.state.last_time_played = Some(now);
        Ok(())
    }

    fn handle_paused(&mut self) {
        // Counts the tail of the segment that just ended
        self.song.accrue_playtime(self.clock.now());
        self.song.state.last_time_played = None;

        if self.song.state.track.playing {
            log::info!(
                "Paused: {} ({:.0}s played)",
                self.song.state.track.id,
                self.song.state.playtime
            );
        }
        self.song.state.track.playing = false;
    }

    /// Adopt a player-reported duration that showed up after the song was committed
    fn refresh_app_duration(&mut self) {
        let metadata = &self.song.metadata;
        if metadata.is_app_duration && !self.song.state.track.is_app_duration {
            log::debug!(
                "Duration of {} corrected: {}s -> {}s",
                metadata.id,
                self.song.state.track.duration,
                metadata.duration
            );
            self.song.state.track.duration = metadata.duration;
            self.song.state.track.is_app_duration = true;
        }
    }

    fn scrobble(&self) -> Result<(), ScrobbleError> {
        log::info!(
            "Scrobbling: {} (played {:.0}s / {}s)",
            self.song.state.track.id,
            self.song.state.playtime,
            self.song.state.track.duration
        );
        self.remote.scrobble_song(&self.song)
    }

    fn set_now_playing(&self) -> Result<(), ScrobbleError> {
        self.remote.set_now_playing(&self.song)
    }
}

/// Submit the tracked song one last time when the process exits.
///
/// Returns whether a scrobble was issued. A song that was never tracked is
/// never eligible.
pub fn flush_on_shutdown<R>(song: &Song, remote: &R) -> Result<bool, ScrobbleError>
where
    R: ScrobbleClient + ?Sized,
{
    if !(song.is_scrobble_eligible() || song.is_rescrobble_eligible()) {
        return Ok(false);
    }

    log::info!("Scrobbling {} before exit", song.state.track.id);
    remote.scrobble_song(song)?;
    Ok(true)
}
