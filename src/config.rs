//! # Configuration Module
//!
//! This module handles configuration management for Cadence. Mixing
//! thresholds, timer intervals and smoothing constants live in a single
//! [`MixConfig`] that is stored as JSON in the platform configuration
//! directory:
//!
//! - Linux: `~/.config/cadence/config.json`
//! - macOS: `~/Library/Application Support/cadence/config.json`
//! - Windows: `%APPDATA%\cadence\config.json`
//!
//! Missing fields fall back to their defaults, so a config file only needs
//! to name the values it overrides.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns the platform-appropriate configuration directory for Cadence,
/// creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system configuration directory cannot be determined
/// - The cadence subdirectory cannot be created due to permissions
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system configuration directory. Please ensure your platform supports standard config directories."
        ))?;

    let cadence_dir = config_dir.join("cadence");
    fs::create_dir_all(&cadence_dir)
        .with_context(|| format!(
            "Failed to create Cadence config directory at {}. Please check file permissions.",
            cadence_dir.display()
        ))?;

    Ok(cadence_dir)
}

/// Returns the path of the default config file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Tunables for curation, transition planning and the two real-time loops.
///
/// All durations are stored in milliseconds so the JSON stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Maximum energy distance between a track and its slot target.
    pub energy_tolerance: f64,
    /// Mood score a track must exceed to be placed on an energy target.
    pub mood_threshold: f64,
    /// Nominal listening window each transition is scheduled inside.
    pub transition_window_ms: u64,
    /// How many ranked candidates take part in the next-track draw.
    pub candidate_pool: usize,
    /// Incoming start delay for energy drops.
    pub drop_delay_ms: u64,
    /// Gain animation frame interval.
    pub animation_interval_ms: u64,
    /// Frequency analysis interval (nominal 10 Hz).
    pub analysis_interval_ms: u64,
    /// Time constant for effect parameter smoothing.
    pub smoothing_ms: u64,
    /// Number of frequency bins read per analysis frame.
    pub frequency_bins: usize,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            energy_tolerance: 0.3,
            mood_threshold: 0.4,
            transition_window_ms: 30_000,
            candidate_pool: 3,
            drop_delay_ms: 2_000,
            animation_interval_ms: 50,
            analysis_interval_ms: 100,
            smoothing_ms: 150,
            frequency_bins: 1024,
        }
    }
}

impl MixConfig {
    /// Load a config file, validating the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds values that fail [`MixConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the config at `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.energy_tolerance) {
            bail!("energy_tolerance must be within [0, 1], got {}", self.energy_tolerance);
        }
        if self.animation_interval_ms == 0 || self.analysis_interval_ms == 0 {
            bail!("Timer intervals must be positive");
        }
        if self.candidate_pool == 0 {
            bail!("candidate_pool must be at least 1");
        }
        if self.frequency_bins == 0 {
            bail!("frequency_bins must be at least 1");
        }
        // The longest transition (beatmatch) must fit inside the window.
        if self.transition_window_ms < 16_000 {
            bail!(
                "transition_window_ms must be at least 16000, got {}",
                self.transition_window_ms
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn transition_window(&self) -> Duration {
        Duration::from_millis(self.transition_window_ms)
    }

    #[must_use]
    pub fn drop_delay(&self) -> Duration {
        Duration::from_millis(self.drop_delay_ms)
    }

    #[must_use]
    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }

    #[must_use]
    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }

    #[must_use]
    pub fn smoothing(&self) -> Duration {
        Duration::from_millis(self.smoothing_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MixConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"candidate_pool": 5}"#)?;

        let config = MixConfig::load(&path)?;
        assert_eq!(config.candidate_pool, 5);
        assert_eq!(config.transition_window_ms, 30_000);
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        let config = MixConfig { smoothing_ms: 200, ..MixConfig::default() };
        config.save(&path)?;
        assert_eq!(MixConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let config = MixConfig::load_or_default(&dir.path().join("absent.json"))?;
        assert_eq!(config, MixConfig::default());
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let short_window = MixConfig { transition_window_ms: 10_000, ..MixConfig::default() };
        assert!(short_window.validate().is_err());

        let no_pool = MixConfig { candidate_pool: 0, ..MixConfig::default() };
        assert!(no_pool.validate().is_err());

        let zero_interval = MixConfig { analysis_interval_ms: 0, ..MixConfig::default() };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_malformed_json_reports_path() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json")?;
        let err = MixConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
        Ok(())
    }
}
