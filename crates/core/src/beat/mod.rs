//! Sub-band energy beat detection.
//!
//! The magnitude spectrum is split into equally sized sub-bands. A sub-band
//! "beats" when its instant energy rises above its average over the recent
//! history, scaled by a sensitivity derived from the sub-band's variance.

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result};

/// Lowest sub-band, where kick drums land.
pub const KICK_BAND: usize = 0;

/// Sizing of a [`BeatDetector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    pub subbands: usize,
    pub history_size: usize,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            subbands: 32,
            history_size: 41,
        }
    }
}

/// Tracks per sub-band energy over a rolling history of spectra.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    subbands: Vec<f32>,
    average_energy: Vec<f32>,
    variance: Vec<f32>,
    sensitivity: Vec<f32>,
    /// `history[subband][slot]`, written cyclically at `position`.
    history: Vec<Vec<f32>>,
    history_size: usize,
    position: usize,
}

impl BeatDetector {
    /// Creates a detector with `subbands` bands averaged over `history_size` frames.
    pub fn new(subbands: usize, history_size: usize) -> Result<Self> {
        if subbands == 0 || history_size == 0 {
            return Err(AnalysisError::invalid(format!(
                "beat detection needs positive sub-bands ({subbands}) and history ({history_size})"
            )));
        }

        let mut detector = Self {
            subbands: Vec::new(),
            average_energy: Vec::new(),
            variance: Vec::new(),
            sensitivity: Vec::new(),
            history: Vec::new(),
            history_size,
            position: 0,
        };
        detector.update_subbands(subbands);
        Ok(detector)
    }

    /// Creates a detector sized by `config`.
    pub fn from_config(config: &BeatConfig) -> Result<Self> {
        Self::new(config.subbands, config.history_size)
    }

    /// Returns the number of sub-bands the spectrum is split into.
    pub fn subband_count(&self) -> usize {
        self.subbands.len()
    }

    /// Returns how many past frames feed the average energy.
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Changes the number of sub-bands. Zero is ignored.
    pub fn update_subbands(&mut self, count: usize) {
        if count == 0 {
            tracing::warn!(current = self.subbands.len(), "ignoring beat sub-band count of zero");
            return;
        }

        tracing::debug!(from = self.subbands.len(), to = count, "updating beat sub-bands");
        self.subbands.resize(count, 0.0);
        self.average_energy.resize(count, 0.0);
        self.variance.resize(count, 0.0);
        self.sensitivity.resize(count, 0.0);
        self.history.resize(count, Vec::new());
        let history_size = self.history_size;
        self.update_history_size(history_size);
    }

    /// Changes how many past frames feed the average energy. Zero is ignored.
    pub fn update_history_size(&mut self, size: usize) {
        if size == 0 {
            tracing::warn!(current = self.history_size, "ignoring beat history size of zero");
            return;
        }

        self.history_size = size;
        for band in &mut self.history {
            band.resize(size, 0.0);
        }
        self.position %= size;
    }

    /// Updates the sub-band energies from one magnitude spectrum.
    pub fn process_magnitude(&mut self, magnitude: &[f32]) {
        let count = self.subbands.len();
        let width = magnitude.len() / count;

        for band in 0..count {
            let bins = &magnitude[band * width..(band + 1) * width];
            let energy = if width == 0 {
                0.0
            } else {
                bins.iter().sum::<f32>() / width as f32
            };
            let variance = if width == 0 {
                0.0
            } else {
                bins.iter().map(|bin| (bin - energy).powi(2)).sum::<f32>() / width as f32
            };

            self.subbands[band] = energy;
            self.variance[band] = variance;
            // Linear regression from variance to sensitivity.
            self.sensitivity[band] = -0.002_571_4 * variance + 1.151_428_6;
        }

        for (band, history) in self.history.iter().enumerate() {
            self.average_energy[band] = history.iter().sum::<f32>() / self.history_size as f32;
        }

        for (band, history) in self.history.iter_mut().enumerate() {
            history[self.position] = self.subbands[band];
        }
        self.position = (self.position + 1) % self.history_size;
    }

    /// Whether the sub-band's energy exceeds its scaled history average.
    pub fn is_beat(&self, subband: usize) -> bool {
        if subband >= self.subbands.len() {
            tracing::error!(subband, count = self.subbands.len(), "beat sub-band out of range");
            return false;
        }
        self.subbands[subband] > self.average_energy[subband] * self.sensitivity[subband]
    }

    /// Whether the lowest sub-band beats.
    pub fn is_kick(&self) -> bool {
        self.is_beat(KICK_BAND)
    }

    /// Lower third of the sub-bands, kick band excluded.
    pub fn is_snare(&self) -> bool {
        let low = 1;
        let high = self.subbands.len() / 3;
        self.is_beat_range(low, high, high.saturating_sub(low) / 3)
            .unwrap_or(false)
    }

    /// Upper half of the sub-bands.
    pub fn is_hihat(&self) -> bool {
        let count = self.subbands.len();
        let low = count / 2;
        let high = count.saturating_sub(1);
        self.is_beat_range(low, high, high.saturating_sub(low) / 3)
            .unwrap_or(false)
    }

    /// Whether more than `threshold` sub-bands in `low..=high` beat.
    pub fn is_beat_range(&self, low: usize, high: usize, threshold: usize) -> Result<bool> {
        let count = self.subbands.len();
        if low >= count || high >= count {
            return Err(AnalysisError::invalid(format!(
                "sub-band range {low}..={high} exceeds {count} sub-bands"
            )));
        }
        if high <= low {
            return Err(AnalysisError::invalid(format!(
                "high sub-band {high} must be above low sub-band {low}"
            )));
        }

        let beats = (low..=high).filter(|&band| self.is_beat(band)).count();
        Ok(beats > threshold)
    }

    /// Instant energy of a sub-band from the last processed spectrum.
    pub fn band(&self, subband: usize) -> Option<f32> {
        self.subbands.get(subband).copied()
    }
}
