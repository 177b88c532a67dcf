use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{
    POMODORO_FOCUS_MINUTES, POMODORO_LONG_BREAK_MINUTES, POMODORO_ROUNDS,
    POMODORO_SHORT_BREAK_MINUTES, PomodoroConfig,
};

pub const SETTINGS_FILE: &str = "settings.toml";

/// User defaults for the start form and the `start` subcommand, read from
/// `settings.toml` in the data directory. Settings are best-effort: a missing
/// file means compiled defaults, a malformed one means compiled defaults plus
/// a warning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_session_minutes: u32,
    pub pomodoro: PomodoroSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PomodoroSettings {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub rounds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_session_minutes: 25,
            pomodoro: PomodoroSettings::default(),
        }
    }
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            focus_minutes: POMODORO_FOCUS_MINUTES,
            short_break_minutes: POMODORO_SHORT_BREAK_MINUTES,
            long_break_minutes: POMODORO_LONG_BREAK_MINUTES,
            rounds: POMODORO_ROUNDS,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                eprintln!("warning: could not read {}: {err}", path.display());
                return Self::default();
            }
        };
        match toml::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("warning: ignoring malformed {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn pomodoro_config(&self) -> PomodoroConfig {
        PomodoroConfig {
            focus_minutes: self.pomodoro.focus_minutes,
            short_break_minutes: self.pomodoro.short_break_minutes,
            long_break_minutes: self.pomodoro.long_break_minutes,
            rounds: self.pomodoro.rounds,
        }
    }
}
