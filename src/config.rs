// Configuration file

use crate::scrobbler::listenbrainz::DEFAULT_API_URL;
use crate::scrobbler::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "am_scrobbler.conf";

/// Settings read from `am_scrobbler.conf`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Download album artwork for new songs
    #[serde(default)]
    pub include_artwork: bool,

    /// Look songs up on the Apple Music website for duration and artwork
    #[serde(default = "default_web_lookup")]
    pub web_lookup: bool,

    /// Apple Music storefront used for web lookups
    #[serde(default = "default_storefront")]
    pub storefront: String,

    /// Retry behaviour for calls to scrobbling services
    #[serde(default)]
    pub retry: RetryConfig,

    /// Primary service, also used for catalogue lookups
    pub lastfm: Option<LastFmConfig>,

    /// Mirrors that receive the same now-playing and scrobble calls
    #[serde(default)]
    pub listenbrainz: Vec<ListenBrainzConfig>,
}

fn default_web_lookup() -> bool {
    true
}

fn default_storefront() -> String {
    "us".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    pub attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastFmConfig {
    pub enabled: bool,
    pub api_key: String,
    pub api_secret: String,
    /// Filled in by `am-scrobbler auth`
    #[serde(default)]
    pub session_key: String,
    #[serde(default)]
    pub username: String,
}

impl LastFmConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            anyhow::bail!("[lastfm] needs api_key and api_secret, create them at https://www.last.fm/api/account/create");
        }
        Ok(())
    }
}

/// One ListenBrainz-compatible server to mirror scrobbles to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenBrainzConfig {
    pub enabled: bool,
    pub name: String,
    pub token: String,
    #[serde(default = "default_listenbrainz_url")]
    pub api_url: String,
}

fn default_listenbrainz_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl ListenBrainzConfig {
    fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            anyhow::bail!("[[listenbrainz]] \"{}\" has no token", self.name);
        }
        if self.api_url.is_empty() {
            anyhow::bail!("[[listenbrainz]] \"{}\" has an empty api_url", self.name);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_artwork: false,
            web_lookup: default_web_lookup(),
            storefront: default_storefront(),
            retry: RetryConfig::default(),
            lastfm: Some(LastFmConfig {
                enabled: false,
                api_key: String::new(),
                api_secret: String::new(),
                session_key: String::new(),
                username: String::new(),
            }),
            listenbrainz: vec![ListenBrainzConfig {
                enabled: false,
                name: "Primary".to_string(),
                token: String::new(),
                api_url: default_listenbrainz_url(),
            }],
        }
    }
}

impl Config {
    /// Default location, `<config dir>/am_scrobbler.conf`
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(dir.join(CONFIG_FILE))
    }

    /// Read and validate `path`. A missing file is created with defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {:?}, writing defaults", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: Config = toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        log::debug!("Config saved to {:?}", path);

        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retry.attempts == 0 {
            anyhow::bail!("retry.attempts must be at least 1");
        }
        if self.web_lookup && self.storefront.trim().is_empty() {
            anyhow::bail!("storefront is required when web_lookup is enabled");
        }

        if let Some(lastfm) = self.lastfm.as_ref().filter(|l| l.enabled) {
            lastfm.validate()?;
        }
        for lb in self.listenbrainz.iter().filter(|l| l.enabled) {
            lb.validate()?;
        }

        if !self.any_service_enabled() {
            log::warn!("Neither Last.fm nor ListenBrainz is enabled, nothing will be scrobbled");
        }

        Ok(())
    }

    fn any_service_enabled(&self) -> bool {
        self.lastfm.iter().any(|l| l.enabled) || self.listenbrainz.iter().any(|l| l.enabled)
    }

    /// Forget the stored Last.fm session so the next start asks for a new one
    pub fn clear_lastfm_session(&mut self) {
        if let Some(lastfm) = &mut self.lastfm {
            lastfm.session_key.clear();
        }
    }
}
