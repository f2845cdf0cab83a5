//! Video-conferencing application actions: bring the window forward, and hang
//! up by sending the app's keyboard shortcut through System Events.
use serde::Deserialize;
use sysinfo::{ProcessesToUpdate, System};

use crate::config::ConferenceConfig;
use crate::error::ScriptError;
use crate::mic::ScriptRunner;

/// Modifier key held while sending a keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
}

impl Modifier {
    fn as_applescript(self) -> &'static str {
        match self {
            Modifier::Command => "command down",
            Modifier::Shift => "shift down",
            Modifier::Option => "option down",
            Modifier::Control => "control down",
        }
    }
}

/// Escapes `s` for use inside an AppleScript double-quoted string literal.
pub fn escape_applescript(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

pub fn focus_script(app_name: &str) -> String {
    format!("tell application \"{}\" to activate", escape_applescript(app_name))
}

pub fn hang_up_script(app_name: &str, key: &str, modifiers: &[Modifier]) -> String {
    let using = if modifiers.is_empty() {
        String::new()
    } else {
        let held: Vec<&str> = modifiers.iter().map(|m| m.as_applescript()).collect();
        format!(" using {{{}}}", held.join(", "))
    };
    format!(
        "{}\ntell application \"System Events\" to keystroke \"{}\"{}",
        focus_script(app_name),
        escape_applescript(key),
        using
    )
}

/// Returns whether `process_name` equals any of `candidates`, ignoring case.
pub fn matches_any(process_name: &str, candidates: &[&str]) -> bool {
    let name = process_name.to_lowercase();
    candidates.iter().any(|c| c.to_lowercase() == name)
}

/// Returns whether a process named like any of `process_names` is running.
pub fn is_running(sys: &System, process_names: &[&str]) -> bool {
    sys.processes()
        .values()
        .any(|p| matches_any(&p.name().to_string_lossy(), process_names))
}

/// Refreshes the process list and checks for any of `process_names`.
pub fn is_process_running(process_names: &[&str]) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, false);
    is_running(&sys, process_names)
}

/// The configured conferencing app driven through a [`ScriptRunner`].
pub struct ConferenceApp<R> {
    runner: R,
    config: ConferenceConfig,
}

impl<R: ScriptRunner> ConferenceApp<R> {
    pub fn new(runner: R, config: ConferenceConfig) -> Self {
        Self { runner, config }
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn focus(&self) -> Result<(), ScriptError> {
        self.runner.run(&focus_script(&self.config.app_name))?;
        Ok(())
    }

    pub fn hang_up(&self) -> Result<(), ScriptError> {
        let script = hang_up_script(
            &self.config.app_name,
            &self.config.hang_up_key,
            &self.config.hang_up_modifiers,
        );
        self.runner.run(&script)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRunner {
        seen: RefCell<Vec<String>>,
    }

    impl ScriptRunner for RecordingRunner {
        fn run(&self, script: &str) -> Result<String, ScriptError> {
            self.seen.borrow_mut().push(script.to_string());
            Ok(String::new())
        }
    }

    // ── escaping ──────────────────────────────────────────────────────────────

    #[test]
    fn escape_plain_names_unchanged() {
        assert_eq!(escape_applescript("Microsoft Teams"), "Microsoft Teams");
    }

    #[test]
    fn escape_quotes_and_backslashes() {
        assert_eq!(escape_applescript(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    // ── scripts ───────────────────────────────────────────────────────────────

    #[test]
    fn focus_script_activates_app() {
        assert_eq!(focus_script("zoom.us"), r#"tell application "zoom.us" to activate"#);
    }

    #[test]
    fn hang_up_script_activates_then_sends_shortcut() {
        let script = hang_up_script("Microsoft Teams", "h", &[Modifier::Command, Modifier::Shift]);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], r#"tell application "Microsoft Teams" to activate"#);
        assert_eq!(
            lines[1],
            r#"tell application "System Events" to keystroke "h" using {command down, shift down}"#
        );
    }

    #[test]
    fn hang_up_script_without_modifiers_omits_using() {
        let script = hang_up_script("App", "q", &[]);
        assert!(script.ends_with(r#"keystroke "q""#));
    }

    // ── ConferenceApp ─────────────────────────────────────────────────────────

    #[test]
    fn actions_run_through_the_runner() {
        let runner = RecordingRunner::default();
        let app = ConferenceApp::new(&runner, ConferenceConfig::default());
        app.focus().unwrap();
        app.hang_up().unwrap();
        let seen = runner.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], focus_script("Microsoft Teams"));
        assert!(seen[1].contains("using {command down, shift down}"));
    }

    // ── process detection ─────────────────────────────────────────────────────

    #[test]
    fn matches_any_ignores_case() {
        let config = ConferenceConfig::default();
        let names = config.effective_process_names();
        assert!(matches_any("MSTeams", &names));
        assert!(matches_any("msteams", &names));
        assert!(matches_any("Microsoft Teams", &names));
        assert!(!matches_any("Microsoft Teams Helper", &names));
        assert!(!matches_any("MSTeams", &[]));
    }

    #[test]
    fn unknown_process_is_not_running() {
        assert!(!is_process_running(&["hattrix-no-such-process-7f3a"]));
    }
}
