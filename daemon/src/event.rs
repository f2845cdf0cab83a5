use crate::config::Config;

pub enum DaemonEvent {
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Box<Config>),
    /// The conferencing app's process appeared in the process list.
    ConferenceStarted,
    /// The conferencing app's process exited.
    ConferenceEnded,
    /// Ctrl+C or SIGTERM received; the daemon should stop the listener and exit.
    Shutdown,
}
