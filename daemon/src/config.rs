use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::conference::Modifier;
use crate::event::DaemonEvent;
use crate::listener::DEFAULT_NOTIFICATION;

pub const MIN_TICK_INTERVAL_MS: u64 = 20;
pub const MAX_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const MIN_RESYNC_INTERVAL_MS: u64 = 100;
pub const MAX_RESYNC_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_RESYNC_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_UNMUTED_INPUT_VOLUME: u8 = 100;
pub const DEFAULT_MUTED_ICON: &str = "🔴";
pub const DEFAULT_LIVE_ICON: &str = "🟢";
pub const DEFAULT_MUTE_SOUND: &str = "mute.mp3";
pub const DEFAULT_UNMUTE_SOUND: &str = "unmute.mp3";
pub const DEFAULT_CONFERENCE_APP: &str = "Microsoft Teams";
/// Process name of the current (work or school) Teams client; the classic
/// client's process was named after the app.
pub const NEW_TEAMS_PROCESS: &str = "MSTeams";
pub const DEFAULT_HANG_UP_KEY: &str = "h";

/// Root configuration structure. Deserialized from
/// `~/Library/Application Support/Hattrix/config.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub mic: MicConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub conference: ConferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Darwin notification posted by the headset on a mute gesture.
    #[serde(default = "default_notification")]
    pub notification: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { notification: default_notification() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// How often the poller checks the gesture flag. Clamped to [20, 1000] ms.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// How often the authoritative mute state is re-read. Clamped to [100, 60000] ms.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            resync_interval_ms: DEFAULT_RESYNC_INTERVAL_MS,
        }
    }
}

impl PollerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms.clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS),
        )
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(
            self.resync_interval_ms.clamp(MIN_RESYNC_INTERVAL_MS, MAX_RESYNC_INTERVAL_MS),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MicConfig {
    /// Input volume restored on unmute. Clamped to [1, 100].
    #[serde(default = "default_unmuted_input_volume")]
    pub unmuted_input_volume: u8,
}

impl Default for MicConfig {
    fn default() -> Self {
        Self { unmuted_input_volume: DEFAULT_UNMUTED_INPUT_VOLUME }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_muted_icon")]
    pub muted_icon: String,
    #[serde(default = "default_live_icon")]
    pub live_icon: String,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { muted_icon: default_muted_icon(), live_icon: default_live_icon() }
    }
}

impl IndicatorConfig {
    pub fn icon_for(&self, muted: bool) -> &str {
        if muted { &self.muted_icon } else { &self.live_icon }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Relative paths resolve against the media directory.
    #[serde(default = "default_mute_sound")]
    pub mute_sound: PathBuf,
    #[serde(default = "default_unmute_sound")]
    pub unmute_sound: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mute_sound: default_mute_sound(),
            unmute_sound: default_unmute_sound(),
        }
    }
}

impl FeedbackConfig {
    pub fn mute_sound_path(&self, media_dir: &Path) -> PathBuf {
        media_dir.join(&self.mute_sound)
    }

    pub fn unmute_sound_path(&self, media_dir: &Path) -> PathBuf {
        media_dir.join(&self.unmute_sound)
    }
}

/// The video-conferencing application whose window and hang-up shortcut are driven.
#[derive(Debug, Clone, Deserialize)]
pub struct ConferenceConfig {
    /// Application name as AppleScript knows it (e.g. "Microsoft Teams").
    #[serde(default = "default_conference_app")]
    pub app_name: String,
    /// Process name used for presence detection, when it differs from `app_name`.
    /// When unset, the app name is used, plus the new client's `MSTeams` for Teams.
    pub process_name: Option<String>,
    #[serde(default = "default_hang_up_key")]
    pub hang_up_key: String,
    #[serde(default = "default_hang_up_modifiers")]
    pub hang_up_modifiers: Vec<Modifier>,
}

impl Default for ConferenceConfig {
    fn default() -> Self {
        Self {
            app_name: default_conference_app(),
            process_name: None,
            hang_up_key: default_hang_up_key(),
            hang_up_modifiers: default_hang_up_modifiers(),
        }
    }
}

impl ConferenceConfig {
    /// Returns the process names that count as the app running.  An explicit
    /// `process_name` is used alone; otherwise the app name, and for Microsoft
    /// Teams also the new client's process name.
    pub fn effective_process_names(&self) -> Vec<&str> {
        if let Some(name) = self.process_name.as_deref() {
            return vec![name];
        }
        let mut names = vec![self.app_name.as_str()];
        if self.app_name.eq_ignore_ascii_case(DEFAULT_CONFERENCE_APP) {
            names.push(NEW_TEAMS_PROCESS);
        }
        names
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "failed to create config watcher");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let Some(watch_dir) = path.parent().map(Path::to_path_buf) else {
        tracing::error!(path = %path.display(), "config path has no parent directory");
        return;
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::error!(error = %e, "failed to watch config directory");
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        if !is_config_write(&event, &path) {
            continue;
        }
        match load_or_default(&path) {
            Ok(config) => {
                if tx.send(DaemonEvent::ConfigReloaded(Box::new(config))).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "failed to reload config"),
        }
    }
}

fn is_config_write(event: &notify::Event, path: &Path) -> bool {
    let affects_config = event.paths.iter().any(|p| p == path);
    let is_write = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    affects_config && is_write
}

fn default_notification() -> String {
    DEFAULT_NOTIFICATION.to_string()
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_resync_interval() -> u64 {
    DEFAULT_RESYNC_INTERVAL_MS
}

fn default_unmuted_input_volume() -> u8 {
    DEFAULT_UNMUTED_INPUT_VOLUME
}

fn default_muted_icon() -> String {
    DEFAULT_MUTED_ICON.to_string()
}

fn default_live_icon() -> String {
    DEFAULT_LIVE_ICON.to_string()
}

fn default_true() -> bool {
    true
}

fn default_mute_sound() -> PathBuf {
    PathBuf::from(DEFAULT_MUTE_SOUND)
}

fn default_unmute_sound() -> PathBuf {
    PathBuf::from(DEFAULT_UNMUTE_SOUND)
}

fn default_conference_app() -> String {
    DEFAULT_CONFERENCE_APP.to_string()
}

fn default_hang_up_key() -> String {
    DEFAULT_HANG_UP_KEY.to_string()
}

fn default_hang_up_modifiers() -> Vec<Modifier> {
    vec![Modifier::Command, Modifier::Shift]
}
