//! The menu-bar icon surface.
use std::path::PathBuf;

use crate::config::IndicatorConfig;
use crate::status::{self, DaemonStatus, ListenerState};

/// Renders the mute state to the user.
///
/// Called only from the poller on the main thread.
pub trait Indicator {
    /// Shows `muted` as the current confirmed state.
    fn show(&mut self, muted: bool);
    /// Surfaces a failed toggle without changing the shown state.
    fn report_error(&mut self, message: &str);
}

/// Publishes the icon through `status.toml`, which the status-bar front end renders.
pub struct StatusIndicator {
    path: PathBuf,
    icons: IndicatorConfig,
    status: DaemonStatus,
    shown: Option<bool>,
}

impl StatusIndicator {
    pub fn new(path: PathBuf, icons: IndicatorConfig) -> Self {
        let status = DaemonStatus::new(icons.icon_for(false));
        Self { path, icons, status, shown: None }
    }

    pub fn status(&self) -> &DaemonStatus {
        &self.status
    }

    /// Replaces the icon set and re-renders the current state.
    pub fn set_icons(&mut self, icons: IndicatorConfig) {
        self.icons = icons;
        self.status.icon = self.icons.icon_for(self.status.muted).to_string();
        self.publish();
    }

    pub fn set_listener(&mut self, listener: ListenerState) {
        self.status.listener = listener;
        self.publish();
    }

    pub fn set_conference_running(&mut self, running: bool) {
        self.status.conference_running = running;
        self.publish();
    }

    fn publish(&self) {
        status::write_status(&self.path, &self.status);
    }
}

impl Indicator for StatusIndicator {
    fn show(&mut self, muted: bool) {
        if self.shown.is_some_and(|prev| prev != muted) {
            self.status.last_change = Some(chrono::Local::now().to_rfc3339());
        }
        self.shown = Some(muted);
        self.status.muted = muted;
        self.status.icon = self.icons.icon_for(muted).to_string();
        self.status.error = None;
        self.publish();
    }

    fn report_error(&mut self, message: &str) {
        self.status.error = Some(message.to_string());
        self.publish();
    }
}
