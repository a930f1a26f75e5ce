//! Engine settings
//!
//! Persisted as a JSON file next to the binary or wherever the caller points.
//! Missing fields take their defaults, so old files keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::evaluator::{EvaluatorConfig, LoopFixMode};
use crate::script::Limits;

/// Engine settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Timing ===
    /// Arena step period
    pub tick_interval_ms: u64,
    /// Countdown pulse period
    pub countdown_interval_ms: u64,
    /// Countdown value shown when play starts
    pub countdown_start: u8,

    // === Sandbox ===
    /// Step budget per submitted function call
    pub max_eval_steps: u64,
    pub max_call_depth: usize,
    /// Captured `print` lines kept per test
    pub max_output_lines: usize,
    /// Longest string or list a submission may build
    pub max_value_len: usize,
    /// How loop-repair challenges are graded
    pub loop_fix: LoopFixMode,

    // === Gameplay ===
    /// Reject turns straight back into the neck
    pub block_reversal: bool,
    /// Run seed; None picks one from the clock
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            tick_interval_ms: 250,
            countdown_interval_ms: 1000,
            countdown_start: 3,

            max_eval_steps: limits.max_steps,
            max_call_depth: limits.max_call_depth,
            max_output_lines: limits.max_output_lines,
            max_value_len: limits.max_value_len,
            loop_fix: LoopFixMode::Execute,

            block_reversal: false,
            seed: None,
        }
    }
}

impl Settings {
    /// Sandbox configuration derived from these settings
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            limits: Limits {
                max_steps: self.max_eval_steps,
                max_call_depth: self.max_call_depth,
                max_output_lines: self.max_output_lines,
                max_value_len: self.max_value_len,
            },
            loop_fix: self.loop_fix,
        }
    }

    /// Seed for a new run
    pub fn run_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(err) => log::warn!("Ignoring malformed settings {}: {err}", path.display()),
            },
            Err(err) => log::info!("No settings at {} ({err})", path.display()),
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.tick_interval_ms, 250);
        assert_eq!(settings.countdown_interval_ms, 1000);
        assert_eq!(settings.countdown_start, 3);
        assert_eq!(settings.evaluator_config(), EvaluatorConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"loop_fix": "pattern", "seed": 9}"#).unwrap();
        assert_eq!(settings.loop_fix, LoopFixMode::Pattern);
        assert_eq!(settings.run_seed(), 9);
        assert_eq!(settings.tick_interval_ms, 250);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            block_reversal: true,
            max_eval_steps: 5000,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(dir.path().join("absent.json")), Settings::default());
    }
}
