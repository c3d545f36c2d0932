use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::AnalyzerConfig, beat::BeatConfig, envelope::EnvelopeConfig,
    onset::OnsetDetectionConfig, spectrogram::SpectrogramConfig, Result,
};

/// Top-level configuration structure for the application. Every section is
/// optional in the JSON file and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalyzerConfig,
    pub envelope: EnvelopeConfig,
    pub onset: OnsetDetectionConfig,
    pub beat: BeatConfig,
    pub spectrogram: SpectrogramConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses a JSON configuration string.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialises the configuration as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{envelope::EnvelopeMode, window::WindowType, AnalysisError};

    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "analysis": { "window_type": "blackman" },
                "envelope": { "mode": "peak", "attack_ms": 5.0 },
                "onset": { "timeout": { "enabled": true, "waiting_time": 2.0 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.analysis.window_type, WindowType::Blackman);
        assert_eq!(config.analysis.frame_size, 512);
        assert_eq!(config.envelope.mode, EnvelopeMode::Peak);
        assert_eq!(config.envelope.release_ms, 100.0);
        assert!(config.onset.timeout.enabled);
        assert_eq!(config.onset.buffer_length, 48);
        assert_eq!(config.beat, BeatConfig::default());
    }

    #[test]
    fn partial_onset_gates_keep_defaults() {
        let config = AppConfig::from_json(
            r#"{ "onset": { "step_unit": { "enabled": true }, "timeout": { "waiting_time": 4.0 } } }"#,
        )
        .unwrap();

        assert!(config.onset.step_unit.enabled);
        assert_eq!(config.onset.step_unit.waiting_time, 0.0);
        assert!(!config.onset.timeout.enabled);
        assert_eq!(config.onset.timeout.waiting_time, 4.0);
    }

    #[test]
    fn loads_what_it_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.spectrogram.hop_size = 256;
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path().join("missing.json")),
            Err(AnalysisError::Io(_))
        ));
        assert!(matches!(
            AppConfig::from_json("{ not json"),
            Err(AnalysisError::Config(_))
        ));
    }
}
