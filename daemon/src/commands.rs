//! One-shot menu actions run from the command line.
use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::conference::{self, ConferenceApp};
use crate::config::Config;
use crate::feedback::Feedback;
use crate::listener;
use crate::mic::{self, Osascript, SystemMic};
use crate::status;

/// Toggles the microphone once.  A running daemon picks the change up on its
/// next resync.
pub fn toggle(config: &Config, media_dir: &Path) -> Result<()> {
    let mic = SystemMic::new(
        Osascript::default(),
        config.mic.unmuted_input_volume,
        Feedback::from_config(&config.feedback, media_dir),
    );
    let muted = mic::toggle(&mic).context("Failed to toggle the microphone")?;
    println!("{} {}", config.indicator.icon_for(muted), if muted { "muted" } else { "live" });
    Ok(())
}

pub fn hang_up(config: &Config) -> Result<()> {
    let app = running_app(config)?;
    app.hang_up()
        .with_context(|| format!("Failed to hang up in {}", app.app_name()))?;
    tracing::info!(app = app.app_name(), "sent hang-up shortcut");
    Ok(())
}

pub fn focus(config: &Config) -> Result<()> {
    let app = running_app(config)?;
    app.focus()
        .with_context(|| format!("Failed to activate {}", app.app_name()))?;
    Ok(())
}

/// Posts the configured headset notification.  A running daemon toggles the
/// microphone exactly as it would for a press of the headset stem.
pub fn gesture(config: &Config) -> Result<()> {
    let name = &config.listener.notification;
    listener::post(name).with_context(|| format!("Failed to post {name}"))?;
    tracing::info!(name = %name, "posted headset mute notification");
    Ok(())
}

/// Prints the status file the daemon last wrote.
pub fn print_status(status_path: &Path) -> Result<()> {
    let s = status::read_status(status_path)
        .context("No status available; is the daemon running?")?;
    println!("{} {}", s.icon, if s.muted { "muted" } else { "live" });
    println!("listener:   {:?}", s.listener);
    println!("conference: {}", if s.conference_running { "running" } else { "not running" });
    if let Some(at) = &s.last_change {
        println!("changed:    {at}");
    }
    if let Some(err) = &s.error {
        println!("error:      {err}");
    }
    println!("version:    {}", s.version);
    Ok(())
}

/// The conferencing app, provided its process is running.  Activating an app
/// that is not running would launch it.
fn running_app(config: &Config) -> Result<ConferenceApp<Osascript>> {
    if !conference::is_process_running(&config.conference.effective_process_names()) {
        bail!("{} is not running", config.conference.app_name);
    }
    Ok(ConferenceApp::new(Osascript::default(), config.conference.clone()))
}
