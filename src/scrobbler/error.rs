// Errors raised at the scrobbling service boundary

use std::fmt;
use thiserror::Error;

/// Which configured service a failure came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    LastFm,
    /// A `[[listenbrainz]]` entry, by its configured name
    ListenBrainz(String),
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::LastFm => f.write_str("Last.fm"),
            Provider::ListenBrainz(name) => write!(f, "ListenBrainz ({})", name),
        }
    }
}

/// Failure talking to a scrobbling service.
///
/// Only [`ScrobbleError::Auth`] is meant to leave the engine loop; the other
/// kinds are retried or swallowed by the service clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrobbleError {
    /// Credentials were rejected, the user has to replace them
    #[error("{provider} rejected the credentials: {message}")]
    Auth { provider: Provider, message: String },

    /// Transport failure or temporary service outage
    #[error("network error: {0}")]
    Network(String),

    /// The service refused the request for any other reason
    #[error("service error: {0}")]
    Service(String),
}

const AUTH_MARKERS: &[&str] = &[
    "invalid session key",
    "invalid api key",
    "authentication failed",
    "unauthorized",
    "invalid authorization token",
    "not authenticated",
    "status code 401",
    "status code 403",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "connection",
    "dns",
    "timed out",
    "timeout",
    "io error",
    "broken pipe",
    "unexpected eof",
    "temporarily",
    "try again",
    "rate limit",
    "service offline",
    "operation failed",
];

impl ScrobbleError {
    pub fn auth(provider: Provider, message: impl Into<String>) -> Self {
        Self::Auth {
            provider,
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// The service whose credentials were refused
    pub fn rejected_by(&self) -> Option<&Provider> {
        match self {
            Self::Auth { provider, .. } => Some(provider),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Map a Last.fm API error code
    ///
    /// See https://www.last.fm/api/errorcodes
    pub fn from_lastfm_code(code: i64, message: impl Into<String>) -> Self {
        let message = format!("Last.fm error {}: {}", code, message.into());
        match code {
            // Authentication failed, invalid session key, invalid API key,
            // unauthorized token, suspended API key
            4 | 9 | 10 | 14 | 26 => Self::auth(Provider::LastFm, message),
            // Operation failed, service offline, temporarily unavailable, rate limited
            8 | 11 | 16 | 29 => Self::Network(message),
            _ => Self::Service(message),
        }
    }

    /// Classify an error that third-party clients only expose as text.
    ///
    /// Unrecognised refusals are permanent; only transport trouble, HTTP 429
    /// and 5xx are worth retrying.
    pub fn from_message(provider: Provider, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Self::auth(provider, message)
        } else if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) || has_retryable_status(&lower) {
            Self::Network(format!("{}: {}", provider, message))
        } else {
            Self::Service(format!("{}: {}", provider, message))
        }
    }
}

/// Any 429 or 5xx number in the message
fn has_retryable_status(message: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter(|digits| digits.len() == 3)
        .filter_map(|digits| digits.parse::<u16>().ok())
        .any(|code| code == 429 || (500..600).contains(&code))
}

impl From<attohttpc::Error> for ScrobbleError {
    fn from(err: attohttpc::Error) -> Self {
        Self::Network(err.to_string())
    }
}
