//! Core library for the audio analysis tools.
//!
//! Each module owns one analysis concern: window functions, the FFT
//! spectrum, scalar frame features, the envelope follower, onset detection,
//! sub-band beat detection and spectrograms. [`analyzer::AudioAnalyzer`]
//! ties them together frame by frame, [`audio`] decodes PCM from WAV files
//! and [`manifest`] describes how the toolkit's modules depend on each other.

pub mod analyzer;
pub mod audio;
pub mod beat;
pub mod config;
pub mod envelope;
pub mod error;
pub mod features;
pub mod manifest;
pub mod onset;
pub mod spectrogram;
pub mod spectrum;
pub mod window;

pub use analyzer::{AnalyzerConfig, AudioAnalyzer, FrameFeatures, SharedAnalyzer, TimedFeatures};
pub use audio::{AudioBuffer, PlaybackCursor};
pub use beat::{BeatConfig, BeatDetector};
pub use config::AppConfig;
pub use envelope::{EnvelopeAnalyzer, EnvelopeConfig, EnvelopeData, EnvelopeError, EnvelopeMode, EnvelopePoint};
pub use error::{AnalysisError, Result};
pub use manifest::{ManifestError, ModuleGraph, ModuleRules, PchUsage, Revision};
pub use onset::{OnsetDetectionConfig, OnsetDetectionFunctions, OnsetDetector, OnsetError};
pub use spectrogram::{compute_spectrogram, Spectrogram, SpectrogramConfig};
pub use spectrum::{Spectrum, SpectrumAnalyzer};
pub use window::WindowType;
