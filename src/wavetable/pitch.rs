//! Fundamental period estimation
//!
//! Uses the normalized square difference function (NSDF), an autocorrelation
//! divided by the energy of the two overlapping segments at each lag:
//!
//! `nsdf(τ) = 2·r(τ) / m(τ)`, with `r(τ) = Σ x[i]·x[i+τ]` and
//! `m(τ) = Σ (x[i]² + x[i+τ]²)`.
//!
//! `r` comes from the FFT identity `ACF = IFFT(|FFT(x)|²)` on a zero-padded
//! buffer, `m` from running sums of squares. The NSDF is bounded to [-1, 1],
//! so its value at the chosen peak doubles as the periodicity confidence.
//!
//! Peak picking takes the first local maximum reaching 90% of the strongest
//! one in the lag range. Later maxima at multiples of the period are about as
//! high, so taking the highest outright would be prone to octave errors.

use rustfft::{num_complex::Complex, FftPlanner};
use crate::config::ExtractionConfig;

const EPSILON: f64 = 1e-12;

/// Fraction of the strongest NSDF maximum the chosen peak must reach
const KEY_MAXIMUM_RATIO: f32 = 0.9;

/// Detected periodicity of a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEstimate {
    /// Period length in samples, fractional
    pub period: f32,
    /// Fundamental frequency in Hz
    pub frequency: f32,
    /// NSDF value at the period, in [-1, 1]
    pub confidence: f32,
}

/// Lag bounds `[min, max]` searched for a window of `len` samples
pub fn lag_range(len: usize, sample_rate: u32, config: &ExtractionConfig) -> Option<(usize, usize)> {
    let sr = sample_rate as f32;
    let min_lag = ((sr / config.max_frequency).floor() as usize).max(2);
    let max_lag = ((sr / config.min_frequency).ceil() as usize).min(len / 2);

    if min_lag + 2 > max_lag {
        return None;
    }
    Some((min_lag, max_lag))
}

/// Estimate the dominant period of `samples`.
///
/// Returns `None` when the window is silent, too short for the configured
/// frequency range, or has no positive NSDF maximum in range. Low-confidence
/// estimates are still returned; the caller decides what to trust.
pub fn estimate_period(samples: &[f32], sample_rate: u32, config: &ExtractionConfig) -> Option<PeriodEstimate> {
    if sample_rate == 0 {
        return None;
    }
    let (min_lag, max_lag) = lag_range(samples.len(), sample_rate, config)?;

    let squares = prefix_squares(samples);
    let total_energy = squares[samples.len()];
    if total_energy < EPSILON {
        log::debug!("Silent window of {} samples, no period", samples.len());
        return None;
    }

    // one lag past the range so the last candidate has a right neighbour
    let acf = autocorrelation(samples, max_lag + 2);
    let nsdf = normalized_difference(&acf, &squares, samples.len());

    let peaks: Vec<usize> = (min_lag..=max_lag)
        .filter(|&lag| nsdf[lag] > 0.0 && nsdf[lag] > nsdf[lag - 1] && nsdf[lag] >= nsdf[lag + 1])
        .collect();

    let strongest = peaks.iter().map(|&lag| nsdf[lag]).fold(0.0f32, f32::max);
    if strongest <= 0.0 {
        return None;
    }

    let lag = peaks
        .into_iter()
        .find(|&lag| nsdf[lag] >= strongest * KEY_MAXIMUM_RATIO)?;

    let (shift, value) = parabolic_peak(nsdf[lag - 1], nsdf[lag], nsdf[lag + 1]);
    let period = lag as f32 + shift;
    let estimate = PeriodEstimate {
        period,
        frequency: sample_rate as f32 / period,
        confidence: value.clamp(-1.0, 1.0),
    };

    log::debug!(
        "Period estimate: {:.2} samples ({:.1} Hz), confidence {:.3}, lag range [{}, {}]",
        estimate.period, estimate.frequency, estimate.confidence, min_lag, max_lag
    );

    Some(estimate)
}

/// Running sums of squares, `out[j] = Σ_{i<j} x[i]²`
pub(crate) fn prefix_squares(samples: &[f32]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len() + 1);
    let mut acc = 0.0f64;
    out.push(acc);
    for &x in samples {
        acc += (x as f64) * (x as f64);
        out.push(acc);
    }
    out
}

/// Linear autocorrelation for lags `0..lags`
fn autocorrelation(samples: &[f32], lags: usize) -> Vec<f64> {
    let n = samples.len();
    let fft_size = (2 * n).next_power_of_two();

    let mut buffer: Vec<Complex<f32>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(fft_size).process(&mut buffer);
    for x in buffer.iter_mut() {
        *x = *x * x.conj();
    }
    planner.plan_fft_inverse(fft_size).process(&mut buffer);

    let scale = 1.0 / fft_size as f64;
    buffer[..lags.min(n)]
        .iter()
        .map(|c| c.re as f64 * scale)
        .collect()
}

fn normalized_difference(acf: &[f64], squares: &[f64], n: usize) -> Vec<f32> {
    acf.iter()
        .enumerate()
        .map(|(lag, &r)| {
            let m = squares[n - lag] + squares[n] - squares[lag];
            if m > EPSILON {
                (2.0 * r / m) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// Vertex of the parabola through three neighbouring points: (offset, value)
fn parabolic_peak(left: f32, center: f32, right: f32) -> (f32, f32) {
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-9 {
        return (0.0, center);
    }
    let shift = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    (shift, center - 0.25 * (left - right) * shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_lag_range() {
        let config = ExtractionConfig::default();
        assert_eq!(lag_range(8820, 44100, &config), Some((8, 2205)));
        assert_eq!(lag_range(1000, 44100, &config), Some((8, 500)));
        assert_eq!(lag_range(10, 44100, &config), None);
    }

    #[test]
    fn test_pure_tone_period() {
        let config = ExtractionConfig::default();
        for &freq in &[55.0f32, 220.0, 440.0, 1000.0, 3000.0] {
            let samples = tone(freq, 44100, 4410);
            let estimate = estimate_period(&samples, 44100, &config).unwrap();
            let error = (estimate.frequency - freq).abs() / freq;
            assert!(error < 0.01, "{} Hz estimated as {} Hz", freq, estimate.frequency);
            assert!(estimate.confidence > 0.9);
        }
    }

    #[test]
    fn test_harmonic_rich_tone_avoids_octave_error() {
        let config = ExtractionConfig::default();
        let freq = 200.0;
        let samples: Vec<f32> = (0..4410)
            .map(|i| {
                let t = i as f32 / 44100.0;
                (2.0 * PI * freq * t).sin() + 0.6 * (4.0 * PI * freq * t).sin() + 0.3 * (6.0 * PI * freq * t).sin()
            })
            .collect();

        let estimate = estimate_period(&samples, 44100, &config).unwrap();
        assert!((estimate.frequency - freq).abs() < 2.0);
    }

    #[test]
    fn test_silence_has_no_period() {
        let config = ExtractionConfig::default();
        assert!(estimate_period(&[0.0; 4410], 44100, &config).is_none());
        assert!(estimate_period(&tone(440.0, 44100, 4410), 0, &config).is_none());
    }

    #[test]
    fn test_parabolic_peak() {
        let (shift, value) = parabolic_peak(0.5, 1.0, 0.5);
        assert_eq!(shift, 0.0);
        assert_eq!(value, 1.0);

        let (shift, _) = parabolic_peak(0.9, 1.0, 0.5);
        assert!(shift < 0.0);
    }
}
