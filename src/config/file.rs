//! Configuration file management for wavescope.
//!
//! This module handles loading and saving the visualizer configuration from a TOML
//! file in the user's config directory. Every field has a default, so a missing file
//! or a partial file is valid.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::spectrum::DEFAULT_WINDOW_LENGTH;

/// Drawing area limits. Zero means "use the whole terminal".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default)]
    pub width: u16,
    #[serde(default)]
    pub height: u16,
}

/// Spectral analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Samples per channel fed to each transform (power of two recommended)
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    /// Raw samples the analysis window advances per elapsed audio frame
    #[serde(default = "default_analysis_rate_multiplier")]
    pub analysis_rate_multiplier: f64,
    /// Lowest frequency shown in the spectrum view
    #[serde(default = "default_min_frequency_hz")]
    pub min_frequency_hz: f64,
    /// Highest frequency shown in the spectrum view
    #[serde(default = "default_max_frequency_hz")]
    pub max_frequency_hz: f64,
    /// Reference level in dBFS for a full-height spectrum bar
    #[serde(default = "default_reference_level_db")]
    pub reference_level_db: i8,
}

/// Refresh intervals of the two views, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CadenceConfig {
    #[serde(default = "default_waveform_interval_ms")]
    pub waveform_interval_ms: f64,
    #[serde(default = "default_spectrum_interval_ms")]
    pub spectrum_interval_ms: f64,
}

/// Scrolling waveform settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaveformConfig {
    /// Frames drawn across the width of the waveform view
    #[serde(default = "default_samples_per_frame")]
    pub samples_per_frame: usize,
}

/// Audio output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `wavescope list-devices`
    /// - device name from `wavescope list-devices`
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_window_length() -> usize {
    DEFAULT_WINDOW_LENGTH
}

fn default_analysis_rate_multiplier() -> f64 {
    2.0
}

fn default_min_frequency_hz() -> f64 {
    20.0
}

fn default_max_frequency_hz() -> f64 {
    5000.0
}

fn default_reference_level_db() -> i8 {
    -20
}

fn default_waveform_interval_ms() -> f64 {
    1000.0 / 60.0
}

fn default_spectrum_interval_ms() -> f64 {
    1000.0 / 48.0
}

fn default_samples_per_frame() -> usize {
    44100 / 4
}

fn default_device() -> String {
    "default".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_length: default_window_length(),
            analysis_rate_multiplier: default_analysis_rate_multiplier(),
            min_frequency_hz: default_min_frequency_hz(),
            max_frequency_hz: default_max_frequency_hz(),
            reference_level_db: default_reference_level_db(),
        }
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            waveform_interval_ms: default_waveform_interval_ms(),
            spectrum_interval_ms: default_spectrum_interval_ms(),
        }
    }
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            samples_per_frame: default_samples_per_frame(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

impl CadenceConfig {
    /// # Errors
    /// - If the interval is not a representable, non-zero duration
    pub fn waveform_interval(&self) -> anyhow::Result<Duration> {
        interval_from_ms("cadence.waveform_interval_ms", self.waveform_interval_ms)
    }

    /// # Errors
    /// - If the interval is not a representable, non-zero duration
    pub fn spectrum_interval(&self) -> anyhow::Result<Duration> {
        interval_from_ms("cadence.spectrum_interval_ms", self.spectrum_interval_ms)
    }
}

/// Converts a millisecond setting into a non-zero `Duration`.
fn interval_from_ms(name: &str, ms: f64) -> anyhow::Result<Duration> {
    let interval = Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|_| anyhow!("{name} must be a positive number of milliseconds, got {ms}"))?;
    if interval.is_zero() {
        return Err(anyhow!("{name} is too small to measure, got {ms}"));
    }
    Ok(interval)
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualizerConfig {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

impl VisualizerConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file exists but cannot be read or parsed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: VisualizerConfig = toml::from_str(&config_content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Writes this configuration to `path`.
    ///
    /// # Errors
    /// - If serialization fails
    /// - If the file cannot be written
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Rejects settings the frame loop cannot run with.
    ///
    /// # Errors
    /// - If the window length, samples per frame or multiplier are not positive
    /// - If either refresh interval is not a positive duration that fits in a `Duration`
    /// - If the spectrum frequency range is empty
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.analysis.window_length == 0 {
            return Err(anyhow!("analysis.window_length must be positive"));
        }
        if !(self.analysis.analysis_rate_multiplier.is_finite()
            && self.analysis.analysis_rate_multiplier > 0.0)
        {
            return Err(anyhow!("analysis.analysis_rate_multiplier must be positive"));
        }
        if !(self.analysis.min_frequency_hz >= 0.0
            && self.analysis.max_frequency_hz > self.analysis.min_frequency_hz)
        {
            return Err(anyhow!(
                "analysis.max_frequency_hz must be greater than analysis.min_frequency_hz"
            ));
        }
        self.cadence.waveform_interval()?;
        self.cadence.spectrum_interval()?;
        if self.waveform.samples_per_frame == 0 {
            return Err(anyhow!("waveform.samples_per_frame must be positive"));
        }
        Ok(())
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("wavescope");

    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("wavescope.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VisualizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.window_length, 16384);
        assert_eq!(config.analysis.analysis_rate_multiplier, 2.0);
        assert_eq!(config.waveform.samples_per_frame, 11025);
        assert_eq!(config.audio.device, "default");
    }

    #[test]
    fn test_default_intervals() {
        let cadence = CadenceConfig::default();
        approx::assert_relative_eq!(
            cadence.waveform_interval().unwrap().as_secs_f64(),
            1.0 / 60.0,
            epsilon = 1e-9
        );
        approx::assert_relative_eq!(
            cadence.spectrum_interval().unwrap().as_secs_f64(),
            1.0 / 48.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: VisualizerConfig = toml::from_str(
            r#"
            [analysis]
            window_length = 4096

            [audio]
            device = "2"
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.window_length, 4096);
        assert_eq!(config.analysis.analysis_rate_multiplier, 2.0);
        assert_eq!(config.audio.device, "2");
        assert_eq!(config.cadence, CadenceConfig::default());
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = VisualizerConfig::default();
        config.analysis.window_length = 0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.cadence.spectrum_interval_ms = 0.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.cadence.waveform_interval_ms = -5.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.cadence.waveform_interval_ms = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.analysis.analysis_rate_multiplier = 0.0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.waveform.samples_per_frame = 0;
        assert!(config.validate().is_err());

        let mut config = VisualizerConfig::default();
        config.analysis.max_frequency_hz = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_intervals_rejected() {
        let mut config = VisualizerConfig::default();
        config.cadence.waveform_interval_ms = 1e300;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cadence.waveform_interval_ms"));
        assert!(config.cadence.waveform_interval().is_err());

        let mut config = VisualizerConfig::default();
        config.cadence.spectrum_interval_ms = 1e-9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cadence.spectrum_interval_ms"));
        assert!(config.cadence.spectrum_interval().is_err());

        let mut config = VisualizerConfig::default();
        config.cadence.spectrum_interval_ms = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavescope.toml");

        let mut config = VisualizerConfig::default();
        config.display.width = 120;
        config.analysis.window_length = 8192;
        config.save_to(&path).unwrap();

        let loaded = VisualizerConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavescope.toml");
        fs::write(&path, "[analysis\nwindow_length = ").unwrap();

        assert!(VisualizerConfig::load_from(&path).is_err());
    }
}
