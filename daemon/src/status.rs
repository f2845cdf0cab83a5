use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// State of the headset notification listener.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    /// Subscribed; headset gestures toggle the microphone.
    Listening,
    /// Subscription failed or the platform has no notify center; only drift
    /// correction is active.
    Unavailable,
    /// The daemon has shut the listener down.
    Stopped,
}

/// Runtime status written by the daemon to
/// `~/Library/Application Support/Hattrix/status.toml`.
/// The status-bar front end reads this file (read-only) to render the icon.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// Last confirmed microphone mute state.
    pub muted: bool,
    /// Icon matching `muted`, as configured.
    pub icon: String,
    pub listener: ListenerState,
    /// Whether the conferencing app's process is running.
    pub conference_running: bool,
    /// RFC 3339 timestamp of the last observed mute state change, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<String>,
    /// Human-readable message for the most recent non-fatal error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial status on daemon startup.
    pub fn new(icon: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            muted: false,
            icon: icon.into(),
            listener: ListenerState::Stopped,
            conference_running: false,
            last_change: None,
            error: None,
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged rather than returned: a status write failure should
/// never stop the daemon.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!(dir = %parent.display(), error = %e, "failed to create status directory");
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::error!(error = %e, "failed to write status file");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize status"),
    }
}

/// Reads a status file written by [`write_status`].
pub fn read_status(path: &Path) -> Result<DaemonStatus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read status file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse status file: {}", path.display()))
}
