//! Band-limited cycle resampling
//!
//! A single cycle is periodic by definition, so resampling is exact in the
//! frequency domain: transform the cycle, keep only the harmonics both the
//! source and the target length can represent, and transform back at the
//! target length. Harmonics at or above the smaller Nyquist limit are dropped,
//! which is what keeps downsampled cycles free of aliasing.

use rustfft::{num_complex::Complex, FftPlanner};

/// Highest harmonic kept when moving a cycle between the two lengths
pub fn harmonic_limit(source_len: usize, target_len: usize) -> usize {
    let shortest = source_len.min(target_len);
    shortest.saturating_sub(1) / 2
}

/// Resample one period of `cycle` to exactly `target_len` samples
pub fn resample_cycle(cycle: &[f32], target_len: usize) -> Vec<f32> {
    let source_len = cycle.len();
    if target_len == 0 {
        return Vec::new();
    }
    if source_len == 0 {
        return vec![0.0; target_len];
    }
    if source_len == target_len {
        return cycle.to_vec();
    }

    let mut planner = FftPlanner::<f32>::new();

    let mut source: Vec<Complex<f32>> = cycle.iter().map(|&x| Complex::new(x, 0.0)).collect();
    planner.plan_fft_forward(source_len).process(&mut source);

    let mut target = vec![Complex::new(0.0f32, 0.0); target_len];
    target[0] = source[0];
    for k in 1..=harmonic_limit(source_len, target_len) {
        target[k] = source[k];
        target[target_len - k] = source[source_len - k];
    }

    planner.plan_fft_inverse(target_len).process(&mut target);

    // rustfft is unnormalized in both directions
    let scale = 1.0 / source_len as f32;
    target.iter().map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn cycle(len: usize, harmonics: &[(usize, f32)]) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * PI * i as f32 / len as f32;
                harmonics.iter().map(|&(k, a)| a * (k as f32 * phase).sin()).sum()
            })
            .collect()
    }

    #[test]
    fn test_harmonic_limit() {
        assert_eq!(harmonic_limit(100, 2048), 49);
        assert_eq!(harmonic_limit(4096, 2048), 1023);
        assert_eq!(harmonic_limit(1, 2048), 0);
    }

    #[test]
    fn test_upsample_preserves_shape() {
        let source = cycle(100, &[(1, 1.0), (3, 0.3)]);
        let resampled = resample_cycle(&source, 2048);
        let expected = cycle(2048, &[(1, 1.0), (3, 0.3)]);

        assert_eq!(resampled.len(), 2048);
        for (a, b) in resampled.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_downsample_drops_unrepresentable_harmonics() {
        let source = cycle(4096, &[(1, 1.0), (100, 0.5)]);
        let resampled = resample_cycle(&source, 64);
        let expected = cycle(64, &[(1, 1.0)]);

        assert_eq!(resampled.len(), 64);
        for (a, b) in resampled.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(resample_cycle(&[], 8), vec![0.0; 8]);
        assert!(resample_cycle(&[1.0, 2.0], 0).is_empty());
        assert_eq!(resample_cycle(&[0.5, -0.5], 2), vec![0.5, -0.5]);
        assert!(resample_cycle(&[0.0; 37], 16).iter().all(|&s| s == 0.0));
    }
}
