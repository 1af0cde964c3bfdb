// Last.fm authentication helpers
// Browser token flow over the REST API, or username/password via rustfm-scrobble-proxy

use super::error::ScrobbleError;
use super::lastfm::api_get;
use anyhow::{Context, Result};
use rustfm_scrobble_proxy::Scrobbler;
use serde_json::Value;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const AUTH_URL: &str = "https://www.last.fm/api/auth/";
const AUTH_TIMEOUT: Duration = Duration::from_secs(180);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A freshly obtained Last.fm session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key: String,
    pub username: String,
}

/// String that gets hashed into `api_sig`: sorted `keyvalue` pairs followed by the secret
fn signature_base(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut base: String = sorted
        .iter()
        .filter(|(key, _)| *key != "format" && *key != "callback")
        .map(|(key, value)| format!("{}{}", key, value))
        .collect();
    base.push_str(api_secret);
    base
}

fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    format!("{:x}", md5::compute(signature_base(params, api_secret)))
}

fn signed_get(params: &[(&str, &str)], api_secret: &str) -> Result<Value, ScrobbleError> {
    let api_sig = sign(params, api_secret);
    let mut all = params.to_vec();
    all.push(("api_sig", api_sig.as_str()));
    api_get(&all)
}

fn parse_session(value: &Value) -> Option<Session> {
    let session = value.get("session")?;
    Some(Session {
        key: session.get("key")?.as_str()?.to_string(),
        username: session
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Browser based flow: request a token, let the user approve it, then trade it for a session
pub fn authenticate_with_token(api_key: &str, api_secret: &str) -> Result<Session> {
    let reply = signed_get(&[("method", "auth.getToken"), ("api_key", api_key)], api_secret)
        .context("Failed to request a Last.fm token")?;
    let token = reply
        .get("token")
        .and_then(Value::as_str)
        .context("Last.fm did not return a token")?
        .to_string();

    println!("Open this page and allow access to your Last.fm account:\n");
    println!("  {}?api_key={}&token={}\n", AUTH_URL, api_key, token);
    println!("Waiting for approval...");

    let started = Instant::now();
    loop {
        let reply = signed_get(
            &[("method", "auth.getSession"), ("api_key", api_key), ("token", token.as_str())],
            api_secret,
        );

        match reply {
            Ok(value) => {
                let session = parse_session(&value).context("Malformed Last.fm session reply")?;
                println!("Session key obtained successfully!\n");
                return Ok(session);
            }
            // 14: token not yet authorized
            Err(ScrobbleError::Auth { message, .. }) if message.contains("error 14") => {}
            Err(err) if err.is_transient() => {
                log::debug!("Polling Last.fm session failed: {}", err);
            }
            Err(err) => return Err(err).context("Last.fm refused the session request"),
        }

        if started.elapsed() >= AUTH_TIMEOUT {
            anyhow::bail!("Timed out waiting for Last.fm authorization");
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Username/password flow, prompts on the terminal
pub fn authenticate_with_password(api_key: &str, api_secret: &str) -> Result<Session> {
    println!("Starting Last.fm authentication...\n");

    let mut scrobbler = Scrobbler::new(api_key, api_secret);

    print!("Last.fm Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim().to_string();

    print!("Last.fm Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim().to_string();

    println!("\nAuthenticating with Last.fm...");
    let session = scrobbler
        .authenticate_with_password(&username, &password)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Last.fm rejected the credentials")?;
    println!("Session key obtained successfully!\n");

    Ok(Session {
        key: session.key,
        username,
    })
}
