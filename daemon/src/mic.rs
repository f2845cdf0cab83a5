//! System microphone control through AppleScript.
//!
//! [`ScriptRunner`] abstracts the `osascript` shell-out so the volume logic can
//! be tested with a scripted fake, and [`MuteControl`] is the seam the poller
//! is written against.

use crate::error::ScriptError;
use crate::feedback::Feedback;

const READ_INPUT_VOLUME: &str = "input volume of (get volume settings)";

/// Executes an AppleScript snippet and returns its trimmed stdout.
pub trait ScriptRunner {
    fn run(&self, script: &str) -> Result<String, ScriptError>;
}

impl<T: ScriptRunner + ?Sized> ScriptRunner for &T {
    fn run(&self, script: &str) -> Result<String, ScriptError> {
        (**self).run(script)
    }
}

/// Real runner invoking `osascript -e <script>`.
pub struct Osascript {
    bin: String,
}

impl Osascript {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for Osascript {
    fn default() -> Self {
        Self::new("osascript")
    }
}

impl ScriptRunner for Osascript {
    fn run(&self, script: &str) -> Result<String, ScriptError> {
        let output = std::process::Command::new(&self.bin)
            .args(["-e", script])
            .output()?;
        if !output.status.success() {
            return Err(ScriptError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Reads and writes the authoritative system mute state.
pub trait MuteControl {
    fn is_muted(&self) -> Result<bool, ScriptError>;
    fn set_muted(&self, muted: bool) -> Result<(), ScriptError>;
}

/// Flips the microphone relative to its current authoritative state and
/// returns the state confirmed by a read afterwards.
///
/// The target is always derived from a fresh read, never from a cached value.
pub fn toggle<M: MuteControl + ?Sized>(mic: &M) -> Result<bool, ScriptError> {
    let current = mic.is_muted()?;
    mic.set_muted(!current)?;
    mic.is_muted()
}

/// Parses the output of `input volume of (get volume settings)`.
///
/// `osascript` prints `missing value` when no input device is selected; that
/// and any other non-numeric output are reported rather than read as "live".
pub fn parse_input_volume(output: &str) -> Result<u8, ScriptError> {
    let trimmed = output.trim();
    trimmed
        .parse::<u8>()
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| ScriptError::UnexpectedOutput(trimmed.to_string()))
}

/// Builds the script that sets the system input volume.
pub fn set_volume_script(volume: u8) -> String {
    format!("set volume input volume {}", volume.min(100))
}

/// Microphone mute modelled as "input volume is zero".
pub struct SystemMic<R> {
    runner: R,
    unmuted_volume: u8,
    feedback: Feedback,
}

impl<R: ScriptRunner> SystemMic<R> {
    pub fn new(runner: R, unmuted_volume: u8, feedback: Feedback) -> Self {
        Self {
            runner,
            unmuted_volume: unmuted_volume.clamp(1, 100),
            feedback,
        }
    }

    pub fn set_unmuted_volume(&mut self, volume: u8) {
        self.unmuted_volume = volume.clamp(1, 100);
    }

    pub fn set_feedback(&mut self, feedback: Feedback) {
        self.feedback = feedback;
    }

    pub fn input_volume(&self) -> Result<u8, ScriptError> {
        parse_input_volume(&self.runner.run(READ_INPUT_VOLUME)?)
    }
}

impl<R: ScriptRunner> MuteControl for SystemMic<R> {
    fn is_muted(&self) -> Result<bool, ScriptError> {
        Ok(self.input_volume()? == 0)
    }

    fn set_muted(&self, muted: bool) -> Result<(), ScriptError> {
        let volume = if muted { 0 } else { self.unmuted_volume };
        self.runner.run(&set_volume_script(volume))?;
        self.feedback.play(muted);
        Ok(())
    }
}
