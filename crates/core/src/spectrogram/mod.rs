//! Short-time magnitude spectrogram of a whole buffer.

use serde::{Deserialize, Serialize};

use crate::{audio::AudioBuffer, spectrum::SpectrumAnalyzer, window::WindowType, AnalysisError, Result};

/// Framing and compression of [`compute_spectrogram`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    /// Exponent applied to every magnitude; values below 1 lift quiet bins.
    pub compression: f32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            compression: 0.2,
        }
    }
}

/// Compressed magnitude columns over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    /// One column of `frame_size / 2` compressed magnitudes per hop.
    pub columns: Vec<Vec<f32>>,
    pub hop_seconds: f32,
    pub bin_hz: f32,
}

impl Spectrogram {
    /// Returns the largest value in any column.
    pub fn max_value(&self) -> f32 {
        self.columns
            .iter()
            .flatten()
            .fold(0.0_f32, |max, value| max.max(*value))
    }

    /// Scales every value into `[0, 1]`. Silent spectrograms stay at zero.
    pub fn normalize(&mut self) {
        let max = self.max_value();
        if max <= 0.0 {
            return;
        }
        for value in self.columns.iter_mut().flatten() {
            *value /= max;
        }
    }
}

/// Computes a Hann-windowed spectrogram of the buffer's mono mix.
pub fn compute_spectrogram(buffer: &AudioBuffer, config: &SpectrogramConfig) -> Result<Spectrogram> {
    if config.hop_size == 0 {
        return Err(AnalysisError::invalid("spectrogram hop size must be positive"));
    }
    if !(config.compression > 0.0) {
        return Err(AnalysisError::invalid(format!(
            "spectrogram compression must be positive, got {}",
            config.compression
        )));
    }

    let mono = buffer.to_mono();
    if mono.len() < config.frame_size {
        return Err(AnalysisError::invalid(format!(
            "{} samples are fewer than one spectrogram frame of {}",
            mono.len(),
            config.frame_size
        )));
    }

    let mut analyzer = SpectrumAnalyzer::new(config.frame_size, WindowType::Hanning)?;
    let mut columns = Vec::with_capacity((mono.len() - config.frame_size) / config.hop_size + 1);
    for start in (0..=mono.len() - config.frame_size).step_by(config.hop_size) {
        let spectrum = analyzer.process(&mono[start..start + config.frame_size])?;
        columns.push(
            spectrum
                .magnitude
                .iter()
                .map(|magnitude| magnitude.powf(config.compression))
                .collect(),
        );
    }

    let sample_rate = buffer.sample_rate() as f32;
    tracing::debug!(columns = columns.len(), frame_size = config.frame_size, "spectrogram computed");
    Ok(Spectrogram {
        columns,
        hop_seconds: config.hop_size as f32 / sample_rate,
        bin_hz: sample_rate / config.frame_size as f32,
    })
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use super::*;

    fn config(frame_size: usize, hop_size: usize) -> SpectrogramConfig {
        SpectrogramConfig {
            frame_size,
            hop_size,
            ..Default::default()
        }
    }

    #[test]
    fn lays_out_columns_by_hop() {
        let buffer = AudioBuffer::mono(vec![0.1; 1000], 8_000).unwrap();
        let spectrogram = compute_spectrogram(&buffer, &config(256, 128)).unwrap();

        assert_eq!(spectrogram.columns.len(), 6);
        assert!(spectrogram.columns.iter().all(|column| column.len() == 128));
        assert_abs_diff_eq!(spectrogram.hop_seconds, 0.016);
        assert_abs_diff_eq!(spectrogram.bin_hz, 31.25);
    }

    #[test]
    fn tone_shows_up_in_its_bin() {
        let samples = (0..2048)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / 8_000.0).sin())
            .collect();
        let buffer = AudioBuffer::mono(samples, 8_000).unwrap();
        let mut spectrogram = compute_spectrogram(&buffer, &config(256, 256)).unwrap();
        spectrogram.normalize();

        let column = &spectrogram.columns[2];
        let peak = column
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, 32);
        assert_abs_diff_eq!(spectrogram.max_value(), 1.0);
    }

    #[test]
    fn rejects_bad_parameters() {
        let buffer = AudioBuffer::mono(vec![0.0; 100], 8_000).unwrap();
        assert!(compute_spectrogram(&buffer, &config(256, 128)).is_err());
        assert!(compute_spectrogram(&buffer, &config(64, 0)).is_err());
        assert!(compute_spectrogram(
            &buffer,
            &SpectrogramConfig {
                compression: 0.0,
                ..config(64, 32)
            }
        )
        .is_err());

        let silent = compute_spectrogram(&buffer, &config(64, 32)).unwrap();
        let mut normalized = silent.clone();
        normalized.normalize();
        assert_eq!(normalized, silent);
    }
}
