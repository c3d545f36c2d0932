use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
};

use serde::{Deserialize, Serialize};

use crate::{
    audio::{AudioBuffer, PlaybackCursor},
    envelope::{EnvelopeAnalyzer, EnvelopeConfig},
    features,
    onset::OnsetDetectionFunctions,
    spectrum::SpectrumAnalyzer,
    window::WindowType,
    AnalysisError, Result,
};

/// Frame size, window and rolloff settings of an [`AudioAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub frame_size: usize,
    pub window_type: WindowType,
    /// Rate assumed for frames passed to [`AudioAnalyzer::process_frame`].
    /// Buffers carry their own rate.
    pub sample_rate: u32,
    pub rolloff_percentile: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            frame_size: 512,
            window_type: WindowType::Hanning,
            sample_rate: 44_100,
            rolloff_percentile: features::DEFAULT_ROLLOFF_PERCENTILE,
        }
    }
}

/// Every descriptor of the most recently processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    pub frame_size: usize,
    pub rms: f32,
    pub peak_energy: f32,
    pub zero_crossing_rate: f32,
    pub spectral_centroid: f32,
    pub spectral_flatness: f32,
    pub spectral_crest: f32,
    pub spectral_rolloff: f32,
    pub spectral_kurtosis: f32,
    pub energy_difference: f32,
    pub spectral_difference: f32,
    pub spectral_difference_hwr: f32,
    pub complex_spectral_difference: f32,
    pub high_frequency_content: f32,
}

/// Features of one frame taken from a buffer, stamped with its start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedFeatures {
    pub time_sec: f32,
    #[serde(flatten)]
    pub features: FrameFeatures,
}

/// Frame-by-frame analysis combining the spectrum, a per-sample envelope and
/// the onset detection functions.
///
/// Onset functions are stateful, so they are evaluated exactly once per
/// processed frame and cached alongside the other descriptors.
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    spectrum: SpectrumAnalyzer,
    envelope: EnvelopeAnalyzer,
    onset: OnsetDetectionFunctions,
    envelope_values: Vec<f32>,
    features: FrameFeatures,
}

impl AudioAnalyzer {
    /// Creates an analyser with the default envelope settings.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Self::with_envelope(config, EnvelopeConfig::default())
    }

    /// Uses the attack, release and mode of `envelope`. The follower always
    /// runs on mono samples and keeps one value per sample.
    pub fn with_envelope(config: AnalyzerConfig, envelope: EnvelopeConfig) -> Result<Self> {
        let spectrum = SpectrumAnalyzer::new(config.frame_size, config.window_type)?;
        let envelope = EnvelopeAnalyzer::new(EnvelopeConfig {
            channels: 1,
            sample_rate: config.sample_rate,
            frame_size: 1,
            ..envelope
        })?;

        Ok(Self {
            onset: OnsetDetectionFunctions::new(config.frame_size / 2),
            spectrum,
            envelope,
            envelope_values: Vec::new(),
            features: FrameFeatures::default(),
            config,
        })
    }

    /// Returns the active configuration, including the current frame size.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Switches the window applied before the FFT.
    pub fn set_window_type(&mut self, window_type: WindowType) {
        self.config.window_type = window_type;
        self.spectrum.set_window_type(window_type);
    }

    /// Analyses one mono frame. A frame of a different length than the
    /// previous one reconfigures the analyser and clears onset history.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<()> {
        if frame.len() != self.config.frame_size {
            self.spectrum.resize(frame.len())?;
            self.onset.update_frame_size(frame.len() / 2);
            self.config.frame_size = frame.len();
        }

        let spectrum = self.spectrum.process(frame)?;
        let magnitude = &spectrum.magnitude;

        self.features = FrameFeatures {
            frame_size: frame.len(),
            rms: features::root_mean_square(frame),
            peak_energy: features::peak_energy(frame),
            zero_crossing_rate: features::zero_crossing_rate(frame),
            spectral_centroid: features::spectral_centroid(magnitude),
            spectral_flatness: features::spectral_flatness(magnitude),
            spectral_crest: features::spectral_crest(magnitude),
            spectral_rolloff: features::spectral_rolloff(magnitude, self.config.rolloff_percentile),
            spectral_kurtosis: features::spectral_kurtosis(magnitude),
            energy_difference: self.onset.energy_difference(frame),
            spectral_difference: self.onset.spectral_difference(magnitude)?,
            spectral_difference_hwr: self.onset.spectral_difference_hwr(magnitude)?,
            complex_spectral_difference: self
                .onset
                .complex_spectral_difference(&spectrum.real, &spectrum.imaginary)?,
            high_frequency_content: OnsetDetectionFunctions::high_frequency_content(magnitude),
        };

        self.envelope_values = frame
            .iter()
            .map(|sample| self.envelope.process_sample(*sample))
            .collect();

        Ok(())
    }

    /// Processes the mono samples between `start` and `end` seconds.
    pub fn process_buffer_range(&mut self, buffer: &AudioBuffer, start: f32, end: f32) -> Result<()> {
        self.sync_sample_rate(buffer.sample_rate())?;
        let frame = buffer.frame_between(start, end)?;
        self.process_frame(&frame)
    }

    /// Processes `length` seconds starting at the cursor, clipped to the end
    /// of the buffer.
    pub fn process_buffer_from(
        &mut self,
        buffer: &AudioBuffer,
        cursor: &PlaybackCursor,
        length: f32,
    ) -> Result<()> {
        if length <= 0.0 {
            return Err(AnalysisError::invalid(format!(
                "analysis length must be positive, got {length}s"
            )));
        }

        let start = cursor.time_seconds;
        let end = (start + length).min(buffer.duration());
        self.process_buffer_range(buffer, start, end)
    }

    /// Walks the whole buffer in consecutive frames of the configured size.
    /// A trailing partial frame is skipped.
    pub fn analyze_buffer(&mut self, buffer: &AudioBuffer) -> Result<Vec<TimedFeatures>> {
        self.sync_sample_rate(buffer.sample_rate())?;

        let frame_size = self.config.frame_size;
        let sample_rate = buffer.sample_rate() as f32;
        let mono = buffer.to_mono();

        let mut frames = Vec::with_capacity(mono.len() / frame_size);
        for (index, frame) in mono.chunks_exact(frame_size).enumerate() {
            self.process_frame(frame)?;
            frames.push(TimedFeatures {
                time_sec: (index * frame_size) as f32 / sample_rate,
                features: self.features.clone(),
            });
        }

        tracing::debug!(frames = frames.len(), frame_size, "buffer analysed");
        Ok(frames)
    }

    /// Returns the half magnitude spectrum of the last frame.
    pub fn magnitude_spectrum(&self) -> &[f32] {
        &self.spectrum.spectrum().magnitude
    }

    /// Envelope follower output for each sample of the last frame.
    pub fn envelope_values(&self) -> &[f32] {
        &self.envelope_values
    }

    /// Returns every descriptor of the last frame.
    pub fn features(&self) -> &FrameFeatures {
        &self.features
    }

    /// Returns the root mean square of the last frame.
    pub fn rms(&self) -> f32 {
        self.features.rms
    }

    /// Returns the largest absolute sample of the last frame.
    pub fn peak_energy(&self) -> f32 {
        self.features.peak_energy
    }

    /// Returns the sign changes counted in the last frame.
    pub fn zero_crossing_rate(&self) -> f32 {
        self.features.zero_crossing_rate
    }

    /// Returns the magnitude-weighted mean bin of the last frame.
    pub fn spectral_centroid(&self) -> f32 {
        self.features.spectral_centroid
    }

    /// Returns the spectral flatness of the last frame.
    pub fn spectral_flatness(&self) -> f32 {
        self.features.spectral_flatness
    }

    /// Returns the peak to mean power ratio of the last frame.
    pub fn spectral_crest(&self) -> f32 {
        self.features.spectral_crest
    }

    /// Returns the normalised rolloff bin of the last frame.
    pub fn spectral_rolloff(&self) -> f32 {
        self.features.spectral_rolloff
    }

    /// Returns the excess kurtosis of the last spectrum.
    pub fn spectral_kurtosis(&self) -> f32 {
        self.features.spectral_kurtosis
    }

    /// Returns the rise in energy since the previous frame.
    pub fn energy_difference(&self) -> f32 {
        self.features.energy_difference
    }

    /// Returns the absolute magnitude change since the previous frame.
    pub fn spectral_difference(&self) -> f32 {
        self.features.spectral_difference
    }

    /// Returns the rising magnitude change since the previous frame.
    pub fn spectral_difference_hwr(&self) -> f32 {
        self.features.spectral_difference_hwr
    }

    /// Returns the deviation from the predicted spectrum.
    pub fn complex_spectral_difference(&self) -> f32 {
        self.features.complex_spectral_difference
    }

    /// Returns the bin-weighted magnitude sum of the last frame.
    pub fn high_frequency_content(&self) -> f32 {
        self.features.high_frequency_content
    }

    fn sync_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate != self.config.sample_rate {
            tracing::debug!(from = self.config.sample_rate, to = sample_rate, "analyser sample rate changed");
            self.envelope.update_sample_rate(sample_rate)?;
            self.config.sample_rate = sample_rate;
        }
        Ok(())
    }
}

impl fmt::Debug for AudioAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioAnalyzer")
            .field("config", &self.config)
            .field("spectrum", &self.spectrum)
            .field("features", &self.features)
            .finish()
    }
}

/// Thread-safe handle over an [`AudioAnalyzer`], so frames can be analysed
/// off the calling thread while readers sample the latest results.
#[derive(Clone)]
pub struct SharedAnalyzer {
    shared: Arc<Mutex<AudioAnalyzer>>,
}

impl SharedAnalyzer {
    /// Moves `analyzer` behind a shared lock.
    pub fn new(analyzer: AudioAnalyzer) -> Self {
        Self {
            shared: Arc::new(Mutex::new(analyzer)),
        }
    }

    /// Processes `frame` on the calling thread.
    pub fn process_frame(&self, frame: &[f32]) -> Result<FrameFeatures> {
        let mut analyzer = self.lock()?;
        analyzer.process_frame(frame)?;
        Ok(analyzer.features().clone())
    }

    /// Processes `frame` on a new thread. The handle yields the features of
    /// that frame once the thread finishes.
    pub fn process_frame_in_background(&self, frame: Vec<f32>) -> JoinHandle<Result<FrameFeatures>> {
        let analyzer = self.clone();
        thread::spawn(move || analyzer.process_frame(&frame))
    }

    /// Returns a copy of the latest descriptors.
    pub fn features(&self) -> Result<FrameFeatures> {
        Ok(self.lock()?.features().clone())
    }

    /// Returns a copy of the latest magnitude spectrum.
    pub fn magnitude_spectrum(&self) -> Result<Vec<f32>> {
        Ok(self.lock()?.magnitude_spectrum().to_vec())
    }

    /// Returns a copy of the latest envelope values.
    pub fn envelope_values(&self) -> Result<Vec<f32>> {
        Ok(self.lock()?.envelope_values().to_vec())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AudioAnalyzer>> {
        self.shared
            .lock()
            .map_err(|_| AnalysisError::msg("audio analyser has been poisoned"))
    }
}

impl fmt::Debug for SharedAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedAnalyzer").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use super::*;

    fn sine(bin: usize, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / len as f32).sin())
            .collect()
    }

    fn analyzer() -> AudioAnalyzer {
        AudioAnalyzer::new(AnalyzerConfig::default()).unwrap()
    }

    #[test]
    fn computes_frame_features() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&sine(16, 512, 1.0)).unwrap();

        assert_eq!(analyzer.magnitude_spectrum().len(), 256);
        assert_abs_diff_eq!(analyzer.spectral_centroid(), 16.0, epsilon = 0.5);
        assert_abs_diff_eq!(analyzer.rms(), std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
        assert_abs_diff_eq!(analyzer.peak_energy(), 1.0, epsilon = 1e-3);
        assert!(analyzer.zero_crossing_rate() > 0.0);
        assert!(analyzer.high_frequency_content() > 0.0);
        assert_eq!(analyzer.features().frame_size, 512);
    }

    #[test]
    fn onset_functions_track_changes_between_frames() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&vec![0.0; 512]).unwrap();
        assert_eq!(analyzer.energy_difference(), 0.0);

        let loud = sine(8, 512, 0.8);
        analyzer.process_frame(&loud).unwrap();
        assert!(analyzer.energy_difference() > 0.0);
        assert!(analyzer.spectral_difference() > 0.0);
        assert!(analyzer.spectral_difference_hwr() > 0.0);
        assert!(analyzer.complex_spectral_difference() > 0.0);

        analyzer.process_frame(&loud).unwrap();
        assert_eq!(analyzer.energy_difference(), 0.0);
        assert_abs_diff_eq!(analyzer.spectral_difference(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn resizes_on_frame_length_change() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&sine(4, 256, 0.5)).unwrap();
        assert_eq!(analyzer.config().frame_size, 256);
        assert_eq!(analyzer.magnitude_spectrum().len(), 128);
        assert!(analyzer.process_frame(&[0.5]).is_err());
    }

    #[test]
    fn envelope_follows_each_sample() {
        let mut analyzer = analyzer();
        analyzer.process_frame(&vec![0.5; 512]).unwrap();
        let values = analyzer.envelope_values();
        assert_eq!(values.len(), 512);
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(values[511] > values[0]);
    }

    #[test]
    fn processes_buffer_ranges() {
        let signal = sine(10, 1000, 0.5);
        let buffer = AudioBuffer::mono(signal, 1000).unwrap();
        let mut analyzer = analyzer();

        analyzer.process_buffer_range(&buffer, 0.0, 0.5).unwrap();
        assert_eq!(analyzer.features().frame_size, 500);
        assert_eq!(analyzer.config().sample_rate, 1000);

        let mut cursor = PlaybackCursor::default();
        cursor.seek(0.75);
        analyzer.process_buffer_from(&buffer, &cursor, 1.0).unwrap();
        assert_eq!(analyzer.features().frame_size, 250);

        assert!(analyzer.process_buffer_from(&buffer, &cursor, 0.0).is_err());
        assert!(analyzer.process_buffer_range(&buffer, 0.5, 2.0).is_err());
    }

    #[test]
    fn analyzes_whole_buffers_frame_by_frame() {
        let buffer = AudioBuffer::mono(vec![0.25; 1200], 1000).unwrap();
        let mut analyzer = analyzer();

        let frames = analyzer.analyze_buffer(&buffer).unwrap();
        assert_eq!(frames.len(), 2);
        assert_abs_diff_eq!(frames[1].time_sec, 0.512);
        assert_abs_diff_eq!(frames[0].features.rms, 0.25, epsilon = 1e-5);
    }

    #[test]
    fn shared_analyzer_processes_in_background() {
        let shared = SharedAnalyzer::new(analyzer());
        let reader = shared.clone();

        let features = shared
            .process_frame_in_background(sine(32, 512, 1.0))
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(reader.features().unwrap(), features);
        assert_eq!(reader.magnitude_spectrum().unwrap().len(), 256);
        assert_eq!(reader.envelope_values().unwrap().len(), 512);
    }
}
