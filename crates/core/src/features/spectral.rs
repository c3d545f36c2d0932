/// Fraction of spectral energy used by [`spectral_rolloff`] unless overridden.
pub const DEFAULT_ROLLOFF_PERCENTILE: f32 = 0.85;

/// Magnitude-weighted mean bin index. Pass only the first half of the
/// spectrum; a mirrored spectrum always centres on the middle bin.
pub fn spectral_centroid(magnitude: &[f32]) -> f32 {
    let (sum, weighted) = magnitude
        .iter()
        .enumerate()
        .fold((0.0_f32, 0.0_f32), |(sum, weighted), (index, value)| {
            (sum + value, weighted + value * index as f32)
        });

    if sum > 0.0 {
        weighted / sum
    } else {
        0.0
    }
}

/// Geometric over arithmetic mean of `1 + magnitude`. The offset keeps
/// silent bins from collapsing the geometric mean to zero.
pub fn spectral_flatness(magnitude: &[f32]) -> f32 {
    if magnitude.is_empty() {
        return 0.0;
    }

    let len = magnitude.len() as f32;
    let (sum, log_sum) = magnitude
        .iter()
        .map(|value| 1.0 + value)
        .fold((0.0_f32, 0.0_f32), |(sum, log_sum), value| {
            (sum + value, log_sum + value.ln())
        });

    let mean = sum / len;
    if mean > 0.0 {
        (log_sum / len).exp() / mean
    } else {
        0.0
    }
}

/// Peak power over mean power. All-zero input yields `1.0`.
pub fn spectral_crest(magnitude: &[f32]) -> f32 {
    let (sum, max) = magnitude
        .iter()
        .map(|value| value * value)
        .fold((0.0_f32, 0.0_f32), |(sum, max), power| {
            (sum + power, max.max(power))
        });

    if sum > 0.0 {
        max / (sum / magnitude.len() as f32)
    } else {
        1.0
    }
}

/// Normalised position of the first bin at which the cumulative magnitude
/// exceeds `percentile` of the total.
pub fn spectral_rolloff(magnitude: &[f32], percentile: f32) -> f32 {
    if magnitude.is_empty() {
        return 0.0;
    }

    let threshold = magnitude.iter().sum::<f32>() * percentile;
    let mut cumulative = 0.0_f32;
    let index = magnitude
        .iter()
        .position(|&value| {
            cumulative += value;
            cumulative > threshold
        })
        .unwrap_or(0);

    index as f32 / magnitude.len() as f32
}

/// Excess kurtosis of the magnitude distribution, `-3.0` for a flat spectrum.
pub fn spectral_kurtosis(magnitude: &[f32]) -> f32 {
    if magnitude.is_empty() {
        return -3.0;
    }

    let len = magnitude.len() as f32;
    let mean = magnitude.iter().sum::<f32>() / len;
    let (moment2, moment4) = magnitude.iter().fold((0.0_f32, 0.0_f32), |(m2, m4), value| {
        let squared = (value - mean).powi(2);
        (m2 + squared, m4 + squared * squared)
    });

    let moment2 = moment2 / len;
    let moment4 = moment4 / len;
    if moment2 == 0.0 {
        return -3.0;
    }

    moment4 / (moment2 * moment2) - 3.0
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn centroid_is_a_bin_index() {
        assert_abs_diff_eq!(spectral_centroid(&[0.0, 0.0, 0.0, 2.0, 0.0]), 3.0);
        assert_abs_diff_eq!(spectral_centroid(&[1.0, 0.0, 1.0]), 1.0);
        assert_eq!(spectral_centroid(&[0.0; 8]), 0.0);
    }

    #[test]
    fn flatness_is_one_for_flat_spectra() {
        assert_abs_diff_eq!(spectral_flatness(&[3.0; 32]), 1.0, epsilon = 1e-5);
        let peaky = spectral_flatness(&[0.0, 0.0, 50.0, 0.0]);
        assert!(peaky < 0.5);
        assert_eq!(spectral_flatness(&[]), 0.0);
    }

    #[test]
    fn crest_compares_peak_to_mean() {
        assert_abs_diff_eq!(spectral_crest(&[1.0; 10]), 1.0);
        assert_abs_diff_eq!(spectral_crest(&[0.0, 0.0, 0.0, 2.0]), 4.0);
        assert_eq!(spectral_crest(&[0.0; 4]), 1.0);
    }

    #[test]
    fn rolloff_finds_energy_edge() {
        let mut magnitude = vec![0.0; 10];
        magnitude[2] = 1.0;
        assert_abs_diff_eq!(spectral_rolloff(&magnitude, DEFAULT_ROLLOFF_PERCENTILE), 0.2);
        assert_abs_diff_eq!(spectral_rolloff(&[1.0; 4], 0.5), 0.5);
    }

    #[test]
    fn kurtosis_of_flat_and_spiky_spectra() {
        assert_eq!(spectral_kurtosis(&[2.0; 16]), -3.0);

        let mut spiky = vec![0.0; 16];
        spiky[5] = 1.0;
        // One outlier in sixteen: m2 = 15/256, m4 = 3165/65536.
        assert_abs_diff_eq!(spectral_kurtosis(&spiky), 11.0667, epsilon = 1e-3);
    }
}
