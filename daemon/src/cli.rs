//! CLI definition using clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hattrix", version, about = "Microphone mute companion for the macOS menu bar")]
pub struct Cli {
    /// Config file (default: ~/Library/Application Support/Hattrix/config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon: headset listener, mute poller and status file (default)
    Run,
    /// Toggle the microphone once and print the resulting state
    Toggle,
    /// Hang up the current call in the conferencing app
    HangUp,
    /// Bring the conferencing app to the front
    Focus,
    /// Print the daemon's last published status
    Status,
    /// Post the headset mute notification, as if the headset stem were pressed
    Gesture,
}
