/// Root mean square of the frame, `0.0` for an empty frame.
pub fn root_mean_square(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }

    let sum: f32 = frame.iter().map(|sample| sample * sample).sum();
    (sum / frame.len() as f32).sqrt()
}

/// Largest absolute sample value.
pub fn peak_energy(frame: &[f32]) -> f32 {
    frame
        .iter()
        .map(|sample| sample.abs())
        .fold(0.0, f32::max)
}

/// Number of sign changes between neighbouring samples. Zero counts as
/// non-positive.
pub fn zero_crossing_rate(frame: &[f32]) -> f32 {
    frame
        .windows(2)
        .filter(|pair| (pair[0] > 0.0) != (pair[1] > 0.0))
        .count() as f32
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn rms_of_constant_and_empty_frames() {
        assert_abs_diff_eq!(root_mean_square(&[0.5; 16]), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(root_mean_square(&[1.0, -1.0]), 1.0, epsilon = 1e-6);
        assert_eq!(root_mean_square(&[]), 0.0);
    }

    #[test]
    fn peak_uses_absolute_values() {
        assert_eq!(peak_energy(&[0.1, -0.9, 0.4]), 0.9);
        assert_eq!(peak_energy(&[]), 0.0);
    }

    #[test]
    fn counts_sign_changes() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]), 3.0);
        assert_eq!(zero_crossing_rate(&[0.0, 0.0, 1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[0.3]), 0.0);
    }
}
