mod cli;
mod commands;
mod conference;
mod config;
mod error;
mod event;
mod feedback;
mod indicator;
mod listener;
mod mic;
mod paths;
mod poller;
mod process_monitor;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::config::Config;
use crate::event::DaemonEvent;
use crate::feedback::Feedback;
use crate::indicator::StatusIndicator;
use crate::listener::{ListenerHandle, MuteSignal};
use crate::mic::{Osascript, SystemMic};
use crate::poller::Poller;
use crate::status::ListenerState;

type DaemonPoller = Poller<SystemMic<Osascript>, StatusIndicator>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("HATTRIX_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let app_dir = paths::app_data_dir()?;
    let config_path = args.config.unwrap_or_else(|| paths::config_file_path(&app_dir));

    match args.command.unwrap_or(cli::Command::Run) {
        cli::Command::Run => run_daemon(&app_dir, config_path).await,
        cli::Command::Toggle => commands::toggle(&load_config(&config_path), &paths::media_dir(&app_dir)),
        cli::Command::HangUp => commands::hang_up(&load_config(&config_path)),
        cli::Command::Focus => commands::focus(&load_config(&config_path)),
        cli::Command::Status => commands::print_status(&paths::status_file_path(&app_dir)),
        cli::Command::Gesture => commands::gesture(&load_config(&config_path)),
    }
}

fn load_config(path: &Path) -> Config {
    config::load_or_default(path).unwrap_or_else(|e| {
        tracing::warn!(error = %format!("{e:#}"), "using default configuration");
        Config::default()
    })
}

async fn run_daemon(app_dir: &Path, config_path: PathBuf) -> Result<()> {
    // ── App data directory ────────────────────────────────────────────────────
    std::fs::create_dir_all(app_dir)
        .with_context(|| format!("Failed to create app data directory {}", app_dir.display()))?;
    let media_dir = paths::media_dir(app_dir);

    // ── Configuration ─────────────────────────────────────────────────────────
    let initial_config = load_config(&config_path);
    let shared_config = Arc::new(RwLock::new(initial_config.clone()));

    // ── Poller and indicator ──────────────────────────────────────────────────
    let signal = MuteSignal::new();
    let mic = SystemMic::new(
        Osascript::default(),
        initial_config.mic.unmuted_input_volume,
        Feedback::from_config(&initial_config.feedback, &media_dir),
    );
    let indicator = StatusIndicator::new(
        paths::status_file_path(app_dir),
        initial_config.indicator.clone(),
    );
    let mut poller = Poller::new(
        mic,
        indicator,
        signal.clone(),
        initial_config.poller.resync_interval(),
    );

    // ── Headset listener thread ───────────────────────────────────────────────
    let mut listener = start_listener(&initial_config.listener.notification, &signal, &mut poller);

    // ── Background tasks ──────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(process_monitor::run(Arc::clone(&shared_config), event_tx.clone()));
    tokio::spawn(wait_for_shutdown(event_tx.clone()));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), muted = poller.is_muted(), "hattrix started");

    // ── Event loop ────────────────────────────────────────────────────────────
    let mut ticker = new_ticker(&initial_config);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poller.tick(Instant::now());
            }
            evt = event_rx.recv() => {
                let Some(evt) = evt else { break };
                match evt {
                    DaemonEvent::ConfigReloaded(new_config) => {
                        tracing::info!("config reloaded");
                        let new_config = *new_config;
                        if listener.as_ref().map(ListenerHandle::notification_name)
                            != Some(new_config.listener.notification.as_str())
                        {
                            if let Some(old) = listener.take() {
                                old.stop();
                            }
                            listener = start_listener(&new_config.listener.notification, &signal, &mut poller);
                        }
                        if new_config.poller.tick_interval() != ticker.period() {
                            ticker = new_ticker(&new_config);
                        }
                        poller.set_resync_interval(new_config.poller.resync_interval());
                        poller.mic_mut().set_unmuted_volume(new_config.mic.unmuted_input_volume);
                        poller.mic_mut().set_feedback(Feedback::from_config(&new_config.feedback, &media_dir));
                        poller.indicator_mut().set_icons(new_config.indicator.clone());
                        *shared_config.write().await = new_config;
                    }

                    DaemonEvent::ConferenceStarted => {
                        tracing::info!("conferencing app started");
                        poller.indicator_mut().set_conference_running(true);
                    }

                    DaemonEvent::ConferenceEnded => {
                        tracing::info!("conferencing app exited");
                        poller.indicator_mut().set_conference_running(false);
                    }

                    DaemonEvent::Shutdown => {
                        tracing::info!("shutting down");
                        break;
                    }
                }
            }
        }
    }

    if let Some(handle) = listener.take() {
        handle.stop();
    }
    poller.indicator_mut().set_listener(ListenerState::Stopped);
    Ok(())
}

/// Subscribes to the headset notification and records the outcome in the
/// status file.  A failed subscription leaves the daemon running on drift
/// correction alone.
fn start_listener(name: &str, signal: &MuteSignal, poller: &mut DaemonPoller) -> Option<ListenerHandle> {
    match listener::start(name, signal.clone()) {
        Ok(handle) => {
            poller.indicator_mut().set_listener(ListenerState::Listening);
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(name, error = %e, "headset listener unavailable; tracking external changes only");
            poller.indicator_mut().set_listener(ListenerState::Unavailable);
            None
        }
    }
}

fn new_ticker(config: &Config) -> Interval {
    let mut ticker = interval(config.poller.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Sends [`DaemonEvent::Shutdown`] on Ctrl+C or SIGTERM.
async fn wait_for_shutdown(tx: mpsc::Sender<DaemonEvent>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    let _ = tx.send(DaemonEvent::Shutdown).await;
}
