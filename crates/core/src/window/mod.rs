use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Default cosine fraction used by [`tukey`] when built through [`create_window`].
pub const DEFAULT_TUKEY_ALPHA: f32 = 0.5;

/// Window applied to a frame before spectral analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Rectangular,
    #[default]
    Hanning,
    Hamming,
    Blackman,
    Tukey,
}

/// Builds a window of `frame_size` coefficients.
pub fn create_window(frame_size: usize, kind: WindowType) -> Vec<f32> {
    match kind {
        WindowType::Rectangular => rectangular(frame_size),
        WindowType::Hanning => hanning(frame_size),
        WindowType::Hamming => hamming(frame_size),
        WindowType::Blackman => blackman(frame_size),
        WindowType::Tukey => tukey(frame_size, DEFAULT_TUKEY_ALPHA),
    }
}

/// All-ones window.
pub fn rectangular(frame_size: usize) -> Vec<f32> {
    vec![1.0; frame_size]
}

/// Raised cosine reaching zero at both ends.
pub fn hanning(frame_size: usize) -> Vec<f32> {
    cosine_window(frame_size, |phase| 0.5 * (1.0 - phase.cos()))
}

/// Raised cosine with 0.08 at both ends.
pub fn hamming(frame_size: usize) -> Vec<f32> {
    cosine_window(frame_size, |phase| 0.54 - 0.46 * phase.cos())
}

/// Three-term cosine window with low side lobes.
pub fn blackman(frame_size: usize) -> Vec<f32> {
    cosine_window(frame_size, |phase| {
        0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
    })
}

/// Tapered cosine window. `alpha` is the fraction of the window inside the
/// cosine taper; values outside `(0, 1]` are clamped.
pub fn tukey(frame_size: usize, alpha: f32) -> Vec<f32> {
    if frame_size <= 1 {
        return rectangular(frame_size);
    }

    let alpha = alpha.clamp(f32::EPSILON, 1.0);
    let span = (frame_size - 1) as f32;
    let flat = alpha * span / 2.0;
    let mut value = 1.0 - (frame_size / 2) as f32;

    (0..frame_size)
        .map(|_| {
            let coefficient = if value.abs() <= flat {
                1.0
            } else {
                0.5 * (1.0 + (PI * ((2.0 * value) / (alpha * span) - 1.0)).cos())
            };
            value += 1.0;
            coefficient
        })
        .collect()
}

/// Evaluates `shape` at `2πi / (n - 1)` for every index.
fn cosine_window(frame_size: usize, shape: impl Fn(f32) -> f32) -> Vec<f32> {
    if frame_size <= 1 {
        return rectangular(frame_size);
    }

    let span = (frame_size - 1) as f32;
    (0..frame_size)
        .map(|index| shape(2.0 * PI * index as f32 / span))
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn hanning_is_zero_at_edges_and_one_in_the_middle() {
        let window = hanning(9);
        assert_abs_diff_eq!(window[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(window[4], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(window[8], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn hamming_and_blackman_edges() {
        assert_abs_diff_eq!(hamming(16)[0], 0.08, epsilon = 1e-6);
        assert_abs_diff_eq!(blackman(16)[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(blackman(17)[8], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn tukey_has_flat_top_and_tapers() {
        let window = tukey(64, 0.5);
        assert_eq!(window.len(), 64);
        assert_abs_diff_eq!(window[32], 1.0, epsilon = 1e-6);
        assert!(window[0] < 0.05);
        // 0.5 * (1 + cos(pi * (2v / (alpha * (n - 1)) - 1))) at v = -29 and v = 29.
        assert_abs_diff_eq!(window[2], 0.060_889, epsilon = 1e-4);
        assert_abs_diff_eq!(window[60], window[2], epsilon = 1e-5);
        // Just outside the flat region, v = -16.
        assert_abs_diff_eq!(window[15], 0.999_378, epsilon = 1e-4);
        assert_eq!(window[16], 1.0);
        assert!(window.iter().all(|value| (0.0..=1.0 + 1e-6).contains(value)));
    }

    #[test]
    fn degenerate_sizes() {
        for kind in [
            WindowType::Rectangular,
            WindowType::Hanning,
            WindowType::Hamming,
            WindowType::Blackman,
            WindowType::Tukey,
        ] {
            assert!(create_window(0, kind).is_empty());
            assert_eq!(create_window(1, kind), vec![1.0]);
        }
    }
}
