//! Attack/release envelope follower.
//!
//! The follower reduces interleaved PCM to one amplitude value per
//! `frame_size` frames, which is what the onset detector consumes.

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result};

/// Time constant giving the classic analog RC response (reaches ~63%).
pub const ANALOG_TIME_CONSTANT: f32 = 1.002_393_4;
/// Time constant reaching 99% of the target within the attack/release time.
pub const DIGITAL_TIME_CONSTANT: f32 = 4.605_170_2;

/// Failures specific to envelope analysis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("no audio data to analyse")]
    ZeroAudioData,
    #[error("invalid channel count {0}, expected at least one")]
    InvalidChannels(u16),
    #[error("invalid sample rate {0}, expected a positive rate")]
    InvalidSampleRate(u32),
    #[error("no envelope points were produced")]
    NotFound,
}

/// How each sample contributes to the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeMode {
    /// Absolute sample value.
    Peak,
    /// Squared sample value.
    #[default]
    Squared,
}

/// Layout of the PCM fed to the follower and its attack/release behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub channels: u16,
    pub sample_rate: u32,
    /// One envelope point is emitted every `frame_size` frames.
    pub frame_size: usize,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub mode: EnvelopeMode,
    /// Use the analog time constant instead of the digital one.
    pub analog: bool,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            frame_size: 1024,
            attack_ms: 10.0,
            release_ms: 100.0,
            mode: EnvelopeMode::Squared,
            analog: true,
        }
    }
}

/// Envelope amplitude sampled at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub time_sec: f32,
    pub amplitude: f32,
}

/// Result of [`EnvelopeAnalyzer::analyze`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub points: Vec<EnvelopePoint>,
    /// Arithmetic mean of all point amplitudes.
    pub average: f32,
}

impl EnvelopeData {
    /// Returns the amplitudes without timestamps.
    pub fn amplitudes(&self) -> impl Iterator<Item = f32> + '_ {
        self.points.iter().map(|point| point.amplitude)
    }
}

/// Attack/release follower that keeps its state between calls.
#[derive(Debug, Clone)]
pub struct EnvelopeAnalyzer {
    config: EnvelopeConfig,
    attack_coefficient: f32,
    release_coefficient: f32,
    current: f32,
}

impl EnvelopeAnalyzer {
    /// Creates a follower after validating `config`.
    pub fn new(config: EnvelopeConfig) -> Result<Self> {
        validate(&config)?;

        let mut analyzer = Self {
            config,
            attack_coefficient: 0.0,
            release_coefficient: 0.0,
            current: 0.0,
        };
        analyzer.update_coefficients();
        Ok(analyzer)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Last envelope value produced by [`Self::process_sample`].
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Changes the sample rate and recomputes the attack/release coefficients.
    pub fn update_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(EnvelopeError::InvalidSampleRate(sample_rate).into());
        }
        self.config.sample_rate = sample_rate;
        self.update_coefficients();
        Ok(())
    }

    /// Changes how many frames separate two envelope points.
    pub fn update_frame_size(&mut self, frame_size: usize) -> Result<()> {
        if frame_size == 0 {
            return Err(AnalysisError::invalid("envelope frame size must be positive"));
        }
        self.config.frame_size = frame_size;
        Ok(())
    }

    /// Changes the channel count used to split interleaved PCM.
    pub fn update_channels(&mut self, channels: u16) -> Result<()> {
        if channels == 0 {
            return Err(EnvelopeError::InvalidChannels(channels).into());
        }
        self.config.channels = channels;
        Ok(())
    }

    /// Returns the follower to silence.
    pub fn reset(&mut self) {
        self.current = 0.0;
    }

    /// Advances the follower by one mono sample and returns the new value.
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let input = match self.config.mode {
            EnvelopeMode::Peak => sample.abs(),
            EnvelopeMode::Squared => sample * sample,
        };

        let coefficient = if input > self.current {
            self.attack_coefficient
        } else {
            self.release_coefficient
        };

        let next = coefficient * (self.current - input) + input;
        self.current = flush_denormal(next).clamp(0.0, 1.0);
        self.current
    }

    /// Follows the envelope over interleaved PCM, continuing from the
    /// current follower state.
    pub fn analyze(&mut self, pcm: &[f32]) -> Result<EnvelopeData> {
        if pcm.is_empty() {
            return Err(EnvelopeError::ZeroAudioData.into());
        }

        let channels = usize::from(self.config.channels);
        let sample_rate = self.config.sample_rate as f32;
        let frame_size = self.config.frame_size;

        let mut points = Vec::with_capacity(pcm.len() / channels / frame_size + 1);
        for (frame_index, frame) in pcm.chunks_exact(channels).enumerate() {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            let amplitude = self.process_sample(mono);

            if frame_index % frame_size == 0 {
                points.push(EnvelopePoint {
                    time_sec: frame_index as f32 / sample_rate,
                    amplitude,
                });
            }
        }

        if points.is_empty() {
            return Err(EnvelopeError::NotFound.into());
        }

        let average = points.iter().map(|point| point.amplitude).sum::<f32>() / points.len() as f32;
        tracing::debug!(points = points.len(), average, "envelope analysed");
        Ok(EnvelopeData { points, average })
    }

    /// Amplitudes of [`Self::analyze`] without timestamps.
    pub fn envelope_values(&mut self, pcm: &[f32]) -> Result<Vec<f32>> {
        Ok(self.analyze(pcm)?.amplitudes().collect())
    }

    fn update_coefficients(&mut self) {
        let time_constant = if self.config.analog {
            ANALOG_TIME_CONSTANT
        } else {
            DIGITAL_TIME_CONSTANT
        };
        let sample_rate = self.config.sample_rate as f32;
        let coefficient = |ms: f32| (-1000.0 * time_constant / (ms * sample_rate)).exp();

        self.attack_coefficient = coefficient(self.config.attack_ms);
        self.release_coefficient = coefficient(self.config.release_ms);
    }
}

fn validate(config: &EnvelopeConfig) -> Result<()> {
    if config.channels == 0 {
        return Err(EnvelopeError::InvalidChannels(config.channels).into());
    }
    if config.sample_rate == 0 {
        return Err(EnvelopeError::InvalidSampleRate(config.sample_rate).into());
    }
    if config.frame_size == 0 {
        return Err(AnalysisError::invalid("envelope frame size must be positive"));
    }
    if !(config.attack_ms > 0.0 && config.release_ms > 0.0) {
        return Err(AnalysisError::invalid(format!(
            "attack ({}ms) and release ({}ms) must be positive",
            config.attack_ms, config.release_ms
        )));
    }
    Ok(())
}

fn flush_denormal(value: f32) -> f32 {
    if value.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        value
    }
}
