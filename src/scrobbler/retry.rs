// Bounded retry for calls to scrobbling services

use super::error::ScrobbleError;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

/// How often and how patiently a remote call is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, used by tests
    #[cfg(test)]
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds, fails permanently or runs out of attempts.
///
/// Only network errors are retried.
pub fn retry<T, F>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, ScrobbleError>
where
    F: FnMut() -> Result<T, ScrobbleError>,
{
    let attempts = policy.attempts.max(1);
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0;
    let result = backoff::retry_notify(
        backoff,
        || {
            attempt += 1;
            op().map_err(|err| {
                if err.is_transient() && attempt < attempts {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        },
        |err: ScrobbleError, wait: Duration| {
            log::warn!("{} failed, retrying in {:?}: {}", label, wait, err);
        },
    );

    result.map_err(|err| match err {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    })
}

/// Turn everything except credential failures into a logged no-op
pub fn best_effort(label: &str, result: Result<(), ScrobbleError>) -> Result<(), ScrobbleError> {
    match result {
        Err(err) if err.is_auth() => Err(err),
        Err(err) => {
            log::warn!("{} gave up: {}", label, err);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
