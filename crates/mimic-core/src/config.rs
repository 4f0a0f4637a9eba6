//! Configuration.
//!
//! Layered load: built-in defaults, then `mimic.toml` (or an explicit
//! path), then `MIMIC_` environment overrides with `__` as the section
//! separator (`MIMIC_RECORDING__PAUSE_THRESHOLD=0.1`). Every key has a
//! default, so a missing file just means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub recording: RecordingConfig,
    pub hotkeys: HotkeysConfig,
    pub window: WindowConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory pattern artifacts are written to.
    pub patterns_directory: PathBuf,
    /// Action queue file shared between the capture and replay processes.
    pub suggested_actions: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            patterns_directory: PathBuf::from("patterns"),
            suggested_actions: PathBuf::from("suggested_actions.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Seconds of input silence recorded as a pause.
    pub pause_threshold: f64,
    /// Seconds between action queue polls while recording.
    pub action_check_interval: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            pause_threshold: 0.05,
            action_check_interval: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeysConfig {
    pub start_recording: String,
    pub stop_recording: String,
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            start_recording: "F2".to_string(),
            stop_recording: "F3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title substring of the target window; empty matches any focused
    /// window.
    pub game_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Seconds between focus re-checks during playback.
    pub focus_check_interval: f64,
    /// Hold used when a release event carries no recorded duration.
    pub hold_fallback_ms: u64,
    /// Seconds between queue polls in the dispatcher.
    pub dispatch_interval: f64,
    /// Playback speed multiplier; 1.0 reproduces recorded timing.
    pub speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            focus_check_interval: 0.1,
            hold_fallback_ms: 100,
            dispatch_interval: 0.1,
            speed: 1.0,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Toml},
            Figment,
        };

        let file = path.unwrap_or_else(|| Path::new("mimic.toml"));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("MIMIC_").split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// Seconds-valued knob to a [`Duration`]. Values outside Duration's
/// range clamp instead of panicking: negative or non-finite to zero,
/// oversized to the maximum.
pub fn secs(value: f64) -> std::time::Duration {
    if value.is_finite() && value > 0.0 {
        std::time::Duration::try_from_secs_f64(value).unwrap_or(std::time::Duration::MAX)
    } else {
        std::time::Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.paths.patterns_directory, PathBuf::from("patterns"));
        assert_eq!(
            config.paths.suggested_actions,
            PathBuf::from("suggested_actions.txt")
        );
        assert_eq!(config.recording.pause_threshold, 0.05);
        assert_eq!(config.recording.action_check_interval, 0.5);
        assert_eq!(config.hotkeys.start_recording, "F2");
        assert_eq!(config.hotkeys.stop_recording, "F3");
        assert_eq!(config.replay.hold_fallback_ms, 100);
        assert_eq!(config.replay.speed, 1.0);
    }

    #[test]
    fn file_overrides_merge_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mimic.toml");
        std::fs::write(
            &path,
            "[recording]\npause_threshold = 0.2\n\n[window]\ngame_title = \"RuneLite\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.recording.pause_threshold, 0.2);
        assert_eq!(config.window.game_title, "RuneLite");
        // untouched sections keep their defaults
        assert_eq!(config.recording.action_check_interval, 0.5);
        assert_eq!(config.hotkeys.stop_recording, "F3");
    }

    #[test]
    fn missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.recording.pause_threshold, 0.05);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mimic.toml");
        std::fs::write(&path, "recording = \"not a table\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn secs_clamps_junk() {
        assert_eq!(secs(0.5), std::time::Duration::from_millis(500));
        assert_eq!(secs(0.0), std::time::Duration::ZERO);
        assert_eq!(secs(-1.0), std::time::Duration::ZERO);
        assert_eq!(secs(f64::NAN), std::time::Duration::ZERO);
        assert_eq!(secs(1e300), std::time::Duration::MAX);
    }
}
