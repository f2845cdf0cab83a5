use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration};

use crate::conference;
use crate::config::Config;
use crate::event::DaemonEvent;

const POLL_INTERVAL_SECS: u64 = 2;

/// Tracks whether the conferencing app is running across polls.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    running: bool,
}

impl PresenceTracker {
    /// Records the latest observation and returns the event to emit, if the
    /// presence changed.
    pub fn observe(&mut self, running: bool) -> Option<DaemonEvent> {
        if running == self.running {
            return None;
        }
        self.running = running;
        Some(if running {
            DaemonEvent::ConferenceStarted
        } else {
            DaemonEvent::ConferenceEnded
        })
    }
}

/// Polls the OS process list every [`POLL_INTERVAL_SECS`] seconds and emits
/// [`DaemonEvent::ConferenceStarted`] / [`DaemonEvent::ConferenceEnded`] events
/// whenever the configured conferencing app appears or disappears.
pub async fn run(config: Arc<RwLock<Config>>, tx: mpsc::Sender<DaemonEvent>) {
    let mut sys = System::new();
    let mut tracker = PresenceTracker::default();
    let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));

    loop {
        ticker.tick().await;

        sys.refresh_processes(ProcessesToUpdate::All, false);

        let running = {
            let config = config.read().await;
            conference::is_running(&sys, &config.conference.effective_process_names())
        };

        if let Some(event) = tracker.observe(running) {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }
}
