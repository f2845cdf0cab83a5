/// Canonical file paths for Hattrix data files on macOS.
///
/// Everything lives under ~/Library/Application Support/Hattrix/:
///   - config.toml  Edited by the user, read (and watched) by the daemon.
///   - status.toml  Written by the daemon, read by the status-bar front end.
///   - media/       Feedback sounds.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "Hattrix";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const MEDIA_DIR_NAME: &str = "media";

/// Returns the Hattrix application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME environment variable not set")?;
    Ok(app_data_dir_in(Path::new(&home)))
}

/// Application data directory relative to an explicit home directory.
pub fn app_data_dir_in(home: &Path) -> PathBuf {
    home.join("Library").join("Application Support").join(APP_DIR_NAME)
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

pub fn media_dir(app_dir: &Path) -> PathBuf {
    app_dir.join(MEDIA_DIR_NAME)
}
