use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{
    window::{create_window, WindowType},
    AnalysisError, Result,
};

/// Non-mirrored half of a frame's FFT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub real: Vec<f32>,
    pub imaginary: Vec<f32>,
    pub magnitude: Vec<f32>,
}

impl Spectrum {
    fn with_bins(bins: usize) -> Self {
        Self {
            real: vec![0.0; bins],
            imaginary: vec![0.0; bins],
            magnitude: vec![0.0; bins],
        }
    }

    /// Returns the number of bins.
    pub fn bins(&self) -> usize {
        self.magnitude.len()
    }
}

/// Windowed forward FFT over fixed-size frames. The plan and scratch buffers
/// are reused between calls and rebuilt only when the frame size changes.
pub struct SpectrumAnalyzer {
    window_type: WindowType,
    window: Vec<f32>,
    fft: FftResources,
    spectrum: Spectrum,
}

impl SpectrumAnalyzer {
    /// Creates an analyser for frames of `frame_size` samples.
    pub fn new(frame_size: usize, window_type: WindowType) -> Result<Self> {
        validate_frame_size(frame_size)?;

        Ok(Self {
            window_type,
            window: create_window(frame_size, window_type),
            fft: FftResources::plan(frame_size),
            spectrum: Spectrum::with_bins(frame_size / 2),
        })
    }

    /// Returns the expected frame length.
    pub fn frame_size(&self) -> usize {
        self.fft.size
    }

    /// Returns the window applied before the FFT.
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Returns the spectrum of the last processed frame.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Rebuilds the plan, window and output buffers for a new frame size.
    pub fn resize(&mut self, frame_size: usize) -> Result<()> {
        validate_frame_size(frame_size)?;
        if frame_size == self.fft.size {
            return Ok(());
        }

        tracing::debug!(from = self.fft.size, to = frame_size, "resizing spectrum analyser");
        self.fft = FftResources::plan(frame_size);
        self.window = create_window(frame_size, self.window_type);
        self.spectrum = Spectrum::with_bins(frame_size / 2);
        Ok(())
    }

    /// Switches the window applied before the FFT.
    pub fn set_window_type(&mut self, window_type: WindowType) {
        self.window_type = window_type;
        self.window = create_window(self.fft.size, window_type);
    }

    /// Windows `frame`, transforms it and stores the half spectrum.
    pub fn process(&mut self, frame: &[f32]) -> Result<&Spectrum> {
        if frame.len() != self.fft.size {
            return Err(AnalysisError::invalid(format!(
                "frame has {} samples, the analyser expects {}",
                frame.len(),
                self.fft.size
            )));
        }

        let fft = &mut self.fft;
        for ((slot, sample), weight) in fft.input.iter_mut().zip(frame).zip(&self.window) {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.output, &mut fft.scratch)?;

        let spectrum = &mut self.spectrum;
        for (index, bin) in fft.output.iter().take(spectrum.bins()).enumerate() {
            spectrum.real[index] = bin.re;
            spectrum.imaginary[index] = bin.im;
            spectrum.magnitude[index] = bin.norm();
        }

        Ok(&self.spectrum)
    }
}

/// Centre frequency in Hz of `bin` for a frame of `frame_size` samples.
pub fn bin_frequency(bin: usize, frame_size: usize, sample_rate: u32) -> f32 {
    if frame_size == 0 {
        return 0.0;
    }
    bin as f32 * sample_rate as f32 / frame_size as f32
}

fn validate_frame_size(frame_size: usize) -> Result<()> {
    if frame_size < 2 {
        return Err(AnalysisError::invalid(format!(
            "frame size must be at least 2, got {frame_size}"
        )));
    }
    Ok(())
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    output: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(size: usize) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            output: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_size", &self.fft.size)
            .field("window_type", &self.window_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use super::*;

    fn sine(frequency_bin: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency_bin as f32 * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn sine_peaks_in_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new(256, WindowType::Rectangular).unwrap();
        let spectrum = analyzer.process(&sine(8, 256)).unwrap();

        assert_eq!(spectrum.bins(), 128);
        let (peak, _) = spectrum
            .magnitude
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak, 8);
        assert_abs_diff_eq!(spectrum.magnitude[8], 128.0, epsilon = 1e-2);
    }

    #[test]
    fn silence_has_empty_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(64, WindowType::Hanning).unwrap();
        let spectrum = analyzer.process(&[0.0; 64]).unwrap();
        assert!(spectrum.magnitude.iter().all(|m| *m == 0.0));
    }

    #[test]
    fn rejects_mismatched_frames_and_tiny_sizes() {
        let mut analyzer = SpectrumAnalyzer::new(64, WindowType::Hanning).unwrap();
        assert!(analyzer.process(&[0.0; 32]).is_err());
        assert!(SpectrumAnalyzer::new(1, WindowType::Hanning).is_err());
    }

    #[test]
    fn resize_rebuilds_buffers() {
        let mut analyzer = SpectrumAnalyzer::new(64, WindowType::Hamming).unwrap();
        analyzer.resize(128).unwrap();
        assert_eq!(analyzer.frame_size(), 128);
        assert_eq!(analyzer.process(&[0.5; 128]).unwrap().bins(), 64);
    }

    #[test]
    fn bin_frequency_scales_with_rate() {
        assert_abs_diff_eq!(bin_frequency(4, 1024, 48_000), 187.5);
        assert_eq!(bin_frequency(4, 0, 48_000), 0.0);
    }
}
