//! Error types for the shell-out and notification-listener layers.
use thiserror::Error;

/// Failure running or interpreting an `osascript` invocation.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to spawn script runner: {0}")]
    Io(#[from] std::io::Error),

    #[error("script exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("unexpected script output: {0:?}")]
    UnexpectedOutput(String),
}

/// Failure subscribing to or posting the headset mute notification.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("notification name contains a NUL byte: {0:?}")]
    InvalidName(String),

    #[error("notify call for {name:?} failed with status {status}")]
    Notify { name: String, status: u32 },

    #[error("notification listening is only supported on macOS")]
    Unsupported,

    #[error("listener thread exited before subscribing")]
    ThreadDied,

    #[error("listener setup failed: {0}")]
    Io(#[from] std::io::Error),
}
