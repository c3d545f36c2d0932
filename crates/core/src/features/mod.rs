//! Scalar descriptors computed from a single frame.
//!
//! [`time`] works on raw PCM samples, [`spectral`] on the non-mirrored half of
//! a magnitude spectrum such as [`crate::Spectrum::magnitude`].

pub mod spectral;
pub mod time;

pub use spectral::{
    spectral_centroid, spectral_crest, spectral_flatness, spectral_kurtosis, spectral_rolloff,
    DEFAULT_ROLLOFF_PERCENTILE,
};
pub use time::{peak_energy, root_mean_square, zero_crossing_rate};
