use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::FeedbackConfig;

const DEFAULT_PLAYER: &str = "afplay";

/// Audible confirmation played after a mute state change.
#[derive(Debug, Clone)]
pub struct Feedback {
    enabled: bool,
    player: String,
    mute_sound: PathBuf,
    unmute_sound: PathBuf,
}

impl Feedback {
    pub fn new(enabled: bool, mute_sound: PathBuf, unmute_sound: PathBuf) -> Self {
        Self {
            enabled,
            player: DEFAULT_PLAYER.to_string(),
            mute_sound,
            unmute_sound,
        }
    }

    /// Builds feedback from config, resolving relative sound paths against `media_dir`.
    pub fn from_config(config: &FeedbackConfig, media_dir: &Path) -> Self {
        Self::new(
            config.enabled,
            config.mute_sound_path(media_dir),
            config.unmute_sound_path(media_dir),
        )
    }

    pub fn disabled() -> Self {
        Self::new(false, PathBuf::new(), PathBuf::new())
    }

    /// Sound file for the given state, if feedback is enabled and the file exists.
    pub fn sound_for(&self, muted: bool) -> Option<&Path> {
        if !self.enabled {
            return None;
        }
        let path = if muted { &self.mute_sound } else { &self.unmute_sound };
        path.is_file().then_some(path.as_path())
    }

    /// Starts playback without waiting for it.  Returns whether a player was
    /// spawned.  The child is reaped on a short-lived helper thread.
    pub fn play(&self, muted: bool) -> bool {
        let Some(path) = self.sound_for(muted) else {
            return false;
        };
        match Command::new(&self.player)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
                true
            }
            Err(e) => {
                tracing::warn!(player = %self.player, error = %e, "failed to play feedback sound");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_sounds(dir: &Path, enabled: bool) -> Feedback {
        let mute = dir.join("mute.mp3");
        let unmute = dir.join("unmute.mp3");
        std::fs::write(&mute, b"ID3").unwrap();
        std::fs::write(&unmute, b"ID3").unwrap();
        Feedback::new(enabled, mute, unmute)
    }

    #[test]
    fn picks_sound_matching_state() {
        let dir = tempfile::tempdir().unwrap();
        let fb = with_sounds(dir.path(), true);
        assert_eq!(fb.sound_for(true).unwrap(), dir.path().join("mute.mp3"));
        assert_eq!(fb.sound_for(false).unwrap(), dir.path().join("unmute.mp3"));
    }

    #[test]
    fn disabled_feedback_never_plays() {
        let dir = tempfile::tempdir().unwrap();
        let fb = with_sounds(dir.path(), false);
        assert!(fb.sound_for(true).is_none());
        assert!(!fb.play(true));
    }

    #[test]
    fn missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fb = Feedback::new(true, dir.path().join("nope.mp3"), dir.path().join("nope2.mp3"));
        assert!(fb.sound_for(true).is_none());
        assert!(!fb.play(false));
    }

    #[test]
    fn from_config_resolves_against_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mute.mp3"), b"ID3").unwrap();
        let fb = Feedback::from_config(&FeedbackConfig::default(), dir.path());
        assert_eq!(fb.sound_for(true).unwrap(), dir.path().join("mute.mp3"));
        assert!(fb.sound_for(false).is_none(), "unmute.mp3 was not installed");
    }

    #[test]
    fn missing_player_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut fb = with_sounds(dir.path(), true);
        fb.player = "/nonexistent/hattrix-player".into();
        assert!(!fb.play(true));
    }
}
