use std::f32::consts::PI;

use crate::{AnalysisError, Result};

/// Wraps a phase into `(-π, π]`.
pub fn princarg(phase: f32) -> f32 {
    let mut wrapped = phase % (2.0 * PI);
    if wrapped <= -PI {
        wrapped += 2.0 * PI;
    } else if wrapped > PI {
        wrapped -= 2.0 * PI;
    }
    wrapped
}

/// Stateful onset detection functions. Each function keeps its own history
/// of the previous frame, so they can be used independently of each other.
#[derive(Debug, Clone)]
pub struct OnsetDetectionFunctions {
    frame_size: usize,
    previous_energy: f32,
    previous_magnitude: Vec<f32>,
    previous_magnitude_hwr: Vec<f32>,
    previous_phase: Vec<f32>,
    previous_phase2: Vec<f32>,
    previous_magnitude_complex: Vec<f32>,
}

impl OnsetDetectionFunctions {
    /// Creates the functions with zeroed history for `frame_size` bins.
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            previous_energy: 0.0,
            previous_magnitude: vec![0.0; frame_size],
            previous_magnitude_hwr: vec![0.0; frame_size],
            previous_phase: vec![0.0; frame_size],
            previous_phase2: vec![0.0; frame_size],
            previous_magnitude_complex: vec![0.0; frame_size],
        }
    }

    /// Returns the number of bins the history holds.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Resizes every history buffer and clears all stored state.
    pub fn update_frame_size(&mut self, frame_size: usize) {
        *self = Self::new(frame_size);
    }

    /// Sum of squared samples of the frame.
    pub fn energy_envelope(frame: &[f32]) -> f32 {
        frame.iter().map(|sample| sample * sample).sum()
    }

    /// Positive first-order difference of the frame energy.
    pub fn energy_difference(&mut self, frame: &[f32]) -> f32 {
        let energy = Self::energy_envelope(frame);
        let difference = energy - self.previous_energy;
        self.previous_energy = energy;
        difference.max(0.0)
    }

    /// Sum of absolute magnitude changes since the previous call.
    pub fn spectral_difference(&mut self, magnitude: &[f32]) -> Result<f32> {
        check_len(magnitude.len(), self.frame_size)?;

        let mut total = 0.0;
        for (previous, &current) in self.previous_magnitude.iter_mut().zip(magnitude) {
            total += (current - *previous).abs();
            *previous = current;
        }
        Ok(total)
    }

    /// Like [`Self::spectral_difference`] but only rising bins contribute.
    pub fn spectral_difference_hwr(&mut self, magnitude: &[f32]) -> Result<f32> {
        check_len(magnitude.len(), self.frame_size)?;

        let mut total = 0.0;
        for (previous, &current) in self.previous_magnitude_hwr.iter_mut().zip(magnitude) {
            total += (current - *previous).max(0.0);
            *previous = current;
        }
        Ok(total)
    }

    /// Distance between each bin and its prediction from the two previous
    /// frames, assuming constant magnitude and phase velocity.
    pub fn complex_spectral_difference(&mut self, real: &[f32], imaginary: &[f32]) -> Result<f32> {
        if real.len() != imaginary.len() {
            return Err(AnalysisError::invalid(format!(
                "real ({}) and imaginary ({}) parts differ in length",
                real.len(),
                imaginary.len()
            )));
        }
        check_len(real.len(), self.frame_size)?;

        let mut total = 0.0;
        for (index, (&re, &im)) in real.iter().zip(imaginary).enumerate() {
            let phase = im.atan2(re);
            let magnitude = re.hypot(im);

            let deviation = princarg(phase - 2.0 * self.previous_phase[index] + self.previous_phase2[index]);
            let magnitude_difference = magnitude - self.previous_magnitude_complex[index];
            let phase_difference = -magnitude * deviation.sin();
            total += magnitude_difference.hypot(phase_difference);

            self.previous_phase2[index] = self.previous_phase[index];
            self.previous_phase[index] = phase;
            self.previous_magnitude_complex[index] = magnitude;
        }
        Ok(total)
    }

    /// Magnitude weighted by bin number, emphasising percussive content.
    pub fn high_frequency_content(magnitude: &[f32]) -> f32 {
        magnitude
            .iter()
            .enumerate()
            .map(|(index, value)| value * (index + 1) as f32)
            .sum()
    }
}

fn check_len(len: usize, frame_size: usize) -> Result<()> {
    if len > frame_size {
        return Err(AnalysisError::invalid(format!(
            "{len} bins exceed the onset history of {frame_size}"
        )));
    }
    Ok(())
}
