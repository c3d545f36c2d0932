//! Onset detection.
//!
//! [`functions`] holds per-frame onset detection functions fed with PCM
//! frames or spectra. [`detector`] picks onset times out of an analysed
//! envelope with an adaptive threshold.

pub mod detector;
pub mod functions;

pub use detector::{
    DetectionStepUnit, DetectionTimeout, OnsetDetectionConfig, OnsetDetector, OnsetError,
    OnsetThreshold,
};
pub use functions::{princarg, OnsetDetectionFunctions};
