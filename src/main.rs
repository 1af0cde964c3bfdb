// AM Scrobbler - reports what the Apple Music desktop player is playing
// to Last.fm and ListenBrainz

mod clock;
mod config;
mod engine;
mod enrichment;
mod player;
mod scrobbler;
mod song;
mod web;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use log::LevelFilter;
use scrobbler::{lastfm_auth, Provider, ScrobbleError, Services};
use song::Song;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use web::AppleMusicWeb;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Watch the player and scrobble (default)
    Run,
    /// Obtain a Last.fm session key and store it in the config
    Auth {
        /// Log in with username and password instead of the browser
        #[arg(long)]
        password: bool,
    },
}

/// Log to stderr from a terminal, to a file in the data directory otherwise
fn init_logger(verbose: u8) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if verbose > 0 {
        let level = match verbose {
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        logger.filter_module(module_path!(), level);
    }

    if !atty::is(atty::Stream::Stderr) {
        match open_log_file() {
            Ok(file) => {
                logger.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Failed to open log file, logging to stderr: {:#}", e),
        }
    }

    logger.init();
}

fn open_log_file() -> Result<fs::File> {
    let dir = dirs::data_dir()
        .context("Failed to get data directory")?
        .join("am-scrobbler");
    fs::create_dir_all(&dir).context("Failed to create log directory")?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("am_scrobbler.log"))
        .context("Failed to open log file")
}

fn auth(config_path: &Path, mut config: Config, password: bool) -> Result<()> {
    let lastfm = config
        .lastfm
        .as_mut()
        .context("No [lastfm] section in the config")?;

    if lastfm.api_key.is_empty() || lastfm.api_secret.is_empty() {
        anyhow::bail!("Set lastfm.api_key and lastfm.api_secret in {:?} first", config_path);
    }

    let session = if password {
        lastfm_auth::authenticate_with_password(&lastfm.api_key, &lastfm.api_secret)?
    } else {
        lastfm_auth::authenticate_with_token(&lastfm.api_key, &lastfm.api_secret)?
    };

    lastfm.session_key = session.key;
    lastfm.username = session.username.clone();
    lastfm.enabled = true;
    config.save_to(config_path)?;

    println!("Authenticated as {}", session.username);
    Ok(())
}

/// Everything the poll worker hands back once it stops
struct Finished {
    song: Song,
    services: Services,
    outcome: Result<(), ScrobbleError>,
}

#[cfg(target_os = "macos")]
fn watch(
    config: &Config,
    services: Services,
    web: Option<AppleMusicWeb>,
    stop: Arc<AtomicBool>,
) -> Result<Finished> {
    use clock::SystemClock;
    use engine::ScrobbleEngine;
    use player::now_playing::NowPlayingSource;

    let mut engine = ScrobbleEngine::new(
        NowPlayingSource::new(),
        web,
        services,
        SystemClock,
        config.include_artwork,
    );

    let outcome = engine.run(&stop);
    let (song, services) = engine.into_parts();
    Ok(Finished {
        song,
        services,
        outcome,
    })
}

#[cfg(not(target_os = "macos"))]
fn watch(
    _config: &Config,
    _services: Services,
    _web: Option<AppleMusicWeb>,
    _stop: Arc<AtomicBool>,
) -> Result<Finished> {
    anyhow::bail!("Watching the Apple Music player is only supported on macOS")
}

/// Resolves once the process is asked to stop
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                Ok("Ctrl+C")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        Ok("Ctrl+C")
    }
}

/// Drop credentials a service refused and say how to replace them
fn forget_rejected_credentials(config: &mut Config, provider: &Provider) -> String {
    match provider {
        Provider::LastFm => {
            config.clear_lastfm_session();
            "run `am-scrobbler auth` again".to_string()
        }
        Provider::ListenBrainz(name) => format!(
            "update the token of the [[listenbrainz]] entry named \"{}\" or set enabled = false",
            name
        ),
    }
}

async fn run(config_path: &Path, mut config: Config) -> Result<()> {
    let services = Services::from_config(&config)?;
    let web = if config.web_lookup {
        Some(AppleMusicWeb::new(&config.storefront)?)
    } else {
        None
    };

    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let config = config.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || watch(&config, services, web, stop))
    };
    tokio::pin!(worker);

    let finished = tokio::select! {
        result = &mut worker => result.context("Poll worker panicked")??,
        signal = shutdown_signal() => {
            log::info!("Received {}, shutting down", signal?);
            stop.store(true, Ordering::SeqCst);
            worker.await.context("Poll worker panicked")??
        }
    };

    let flushed = match finished.outcome {
        Ok(()) => engine::flush_on_shutdown(&finished.song, &finished.services).map(|_| ()),
        Err(err) => Err(err),
    };

    match flushed {
        Ok(()) => Ok(()),
        Err(err) => match err.rejected_by() {
            Some(provider) => {
                let hint = forget_rejected_credentials(&mut config, provider);
                if *provider == Provider::LastFm {
                    config.save_to(config_path)?;
                }
                anyhow::bail!("{}, {}", err, hint)
            }
            None => {
                log::warn!("Final scrobble failed: {}", err);
                Ok(())
            }
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(&config_path, config).await,
        Command::Auth { password } => {
            let config_path = config_path.clone();
            tokio::task::spawn_blocking(move || auth(&config_path, config, password))
                .await
                .context("Authentication task panicked")?
        }
    }
}
