use serde::{Deserialize, Serialize};

use crate::envelope::EnvelopeData;

/// Failures of the envelope onset detector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnsetError {
    /// Apparently the audio is completely silent.
    #[error("no onset was detected")]
    NotDetected,
    #[error("envelope contains no points")]
    EmptyEnvelope,
    #[error("detection buffer length {0} is below 2")]
    BufferLength(usize),
    #[error("step unit waiting time must be positive")]
    StepWaitingTime,
    #[error("timeout waiting time must be positive")]
    TimeoutWaitingTime,
}

/// Parameters of the adaptive threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetThreshold {
    /// How far above the running average an onset must rise (`avg / divider`).
    pub excess_average_divider: f32,
    /// Smoothing of threshold updates; larger values update more slowly.
    pub updating_divider: f32,
    /// Seconds without an onset after which the threshold starts decaying.
    pub decreasing_delay: f32,
    /// Decay per envelope point once the delay has passed.
    pub decreasing_divider: f32,
}

impl Default for OnsetThreshold {
    fn default() -> Self {
        Self {
            excess_average_divider: 3.0,
            updating_divider: 1.5,
            decreasing_delay: 3.0,
            decreasing_divider: 1.25,
        }
    }
}

/// Forces an onset when none was detected for `waiting_time` seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionTimeout {
    pub enabled: bool,
    pub waiting_time: f32,
}

impl DetectionTimeout {
    /// Enabled timeout firing after `waiting_time` seconds of silence.
    pub fn after(waiting_time: f32) -> Self {
        Self {
            enabled: true,
            waiting_time,
        }
    }
}

/// Suppresses onsets closer than `waiting_time` seconds to the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionStepUnit {
    pub enabled: bool,
    pub waiting_time: f32,
}

impl DetectionStepUnit {
    /// Enabled step unit allowing at most one onset per `waiting_time` seconds.
    pub fn every(waiting_time: f32) -> Self {
        Self {
            enabled: true,
            waiting_time,
        }
    }
}

/// Everything [`OnsetDetector`] needs besides the envelope itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetDetectionConfig {
    pub threshold: OnsetThreshold,
    /// Number of envelope points kept for the running average (32-48 works well).
    pub buffer_length: usize,
    pub timeout: DetectionTimeout,
    pub step_unit: DetectionStepUnit,
    /// Scale applied to every reported onset time.
    pub multiplier: f32,
}

impl Default for OnsetDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: OnsetThreshold::default(),
            buffer_length: 48,
            timeout: DetectionTimeout::default(),
            step_unit: DetectionStepUnit::default(),
            multiplier: 1.0,
        }
    }
}

/// Picks onset times out of an envelope using an adaptive threshold.
#[derive(Debug, Clone, Default)]
pub struct OnsetDetector {
    config: OnsetDetectionConfig,
}

impl OnsetDetector {
    /// Creates a detector; the configuration is checked on every [`Self::detect`].
    pub fn new(config: OnsetDetectionConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &OnsetDetectionConfig {
        &self.config
    }

    /// Rejects a history shorter than two points and non-positive waiting
    /// times on enabled step units or timeouts.
    pub fn validate(&self) -> Result<(), OnsetError> {
        let config = &self.config;
        if config.buffer_length < 2 {
            return Err(OnsetError::BufferLength(config.buffer_length));
        }
        if config.step_unit.enabled && config.step_unit.waiting_time <= 0.0 {
            return Err(OnsetError::StepWaitingTime);
        }
        if config.timeout.enabled && config.timeout.waiting_time <= 0.0 {
            return Err(OnsetError::TimeoutWaitingTime);
        }
        Ok(())
    }

    /// Returns onset times in seconds (scaled by the multiplier).
    pub fn detect(&self, envelope: &EnvelopeData) -> Result<Vec<f32>, OnsetError> {
        if envelope.points.is_empty() {
            return Err(OnsetError::EmptyEnvelope);
        }
        self.validate()?;

        let config = &self.config;
        let mut state = DetectionState::new(envelope.average, config.buffer_length);
        let mut onsets = Vec::new();

        for point in &envelope.points {
            let time = point.time_sec;
            state.push(point.amplitude);
            state.update_threshold(&config.threshold);

            if time - state.previous_onset > config.threshold.decreasing_delay {
                state.threshold -= state.threshold / config.threshold.decreasing_divider;
            }

            if config.timeout.enabled && time - state.previous_onset > config.timeout.waiting_time {
                onsets.push(time * config.multiplier);
                state.previous_onset = time
                    + if config.step_unit.enabled {
                        config.step_unit.waiting_time
                    } else {
                        0.0
                    };
                continue;
            }

            let allowed = !config.step_unit.enabled
                || time - state.previous_onset >= config.step_unit.waiting_time;
            if allowed && state.latest() > state.threshold {
                state.previous_onset = time;
                onsets.push(time * config.multiplier);
            }
        }

        if onsets.is_empty() {
            return Err(OnsetError::NotDetected);
        }

        tracing::debug!(onsets = onsets.len(), points = envelope.points.len(), "onsets detected");
        Ok(onsets)
    }
}

struct DetectionState {
    /// Newest amplitude first.
    history: Vec<f32>,
    threshold: f32,
    previous_onset: f32,
}

impl DetectionState {
    fn new(average: f32, length: usize) -> Self {
        Self {
            history: vec![average; length],
            threshold: 0.0,
            previous_onset: 0.0,
        }
    }

    fn push(&mut self, amplitude: f32) {
        self.history.rotate_right(1);
        self.history[0] = amplitude;
    }

    fn latest(&self) -> f32 {
        self.history[0]
    }

    fn update_threshold(&mut self, params: &OnsetThreshold) {
        let sum: f32 = self.history.iter().sum();
        let average = sum / (self.history.len() - 1) as f32;
        let candidate = average + average / params.excess_average_divider;

        if self.previous_onset <= 0.0 || candidate <= 0.0 {
            self.threshold = (1.0 / 8.0) / params.excess_average_divider;
        } else {
            self.threshold += (candidate - self.threshold) / params.updating_divider;
        }
    }
}
