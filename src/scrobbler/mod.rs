// Scrobbler module
// Contains the remote client contract and implementations for each scrobbling service

pub mod error;
pub mod lastfm;
pub mod lastfm_auth;
pub mod listenbrainz;
pub mod retry;
pub mod traits;

pub use error::{Provider, ScrobbleError};
pub use traits::ScrobbleClient;

use crate::config::Config;
use crate::song::Song;
use anyhow::Result;
use lastfm::LastFmScrobbler;
use listenbrainz::ListenBrainzScrobbler;

/// Every configured scrobbling service behind one client.
///
/// Last.fm (when enabled) answers catalogue lookups; now-playing and scrobble
/// calls go to every service. A credential failure on one service does not stop
/// the others from being notified, it is reported once they all ran.
pub struct Services {
    primary: Option<Box<dyn ScrobbleClient + Send>>,
    mirrors: Vec<Box<dyn ScrobbleClient + Send>>,
}

impl Services {
    pub fn new(
        primary: Option<Box<dyn ScrobbleClient + Send>>,
        mirrors: Vec<Box<dyn ScrobbleClient + Send>>,
    ) -> Self {
        Self { primary, mirrors }
    }

    /// Build the enabled services from the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let retry = config.retry.policy();

        let primary = match &config.lastfm {
            Some(lastfm) if lastfm.enabled => {
                if lastfm.session_key.is_empty() {
                    anyhow::bail!("Last.fm is enabled but not authenticated, run `am-scrobbler auth` first");
                }
                log::info!("Last.fm scrobbling enabled");
                Some(Box::new(LastFmScrobbler::new(
                    &lastfm.api_key,
                    &lastfm.api_secret,
                    &lastfm.session_key,
                    retry.clone(),
                )) as Box<dyn ScrobbleClient + Send>)
            }
            _ => None,
        };

        let mut mirrors: Vec<Box<dyn ScrobbleClient + Send>> = Vec::new();
        for lb in config.listenbrainz.iter().filter(|lb| lb.enabled) {
            let service = ListenBrainzScrobbler::new(lb.name.clone(), &lb.token, &lb.api_url, retry.clone())?;
            log::info!("ListenBrainz ({}) scrobbling enabled", lb.name);
            mirrors.push(Box::new(service));
        }

        Ok(Self::new(primary, mirrors))
    }

    fn all(&self) -> impl Iterator<Item = &(dyn ScrobbleClient + Send)> {
        self.primary.iter().chain(self.mirrors.iter()).map(|s| &**s)
    }

    /// Run `call` on every service, keeping the first credential failure
    fn broadcast<F>(&self, call: F) -> Result<(), ScrobbleError>
    where
        F: Fn(&dyn ScrobbleClient) -> Result<(), ScrobbleError>,
    {
        let mut first_error = None;
        for service in self.all() {
            if let Err(err) = call(service) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl ScrobbleClient for Services {
    fn update_metadata(&self, song: &mut Song) -> Result<(), ScrobbleError> {
        match &self.primary {
            Some(primary) => primary.update_metadata(song),
            None => Ok(()),
        }
    }

    fn set_now_playing(&self, song: &Song) -> Result<(), ScrobbleError> {
        self.broadcast(|service| service.set_now_playing(song))
    }

    fn scrobble_song(&self, song: &Song) -> Result<(), ScrobbleError> {
        self.broadcast(|service| service.scrobble_song(song))
    }
}
