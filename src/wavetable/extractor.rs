//! Cycle extraction
//!
//! Turns one analysis window into one table. The default `cycle` method is
//! pitch-synchronous: estimate the period, cut exactly one period around the
//! loudest part of the window starting on an ascending zero crossing, and
//! resample it band-limited to the table length. Windows without a trusted
//! period (noise, silence) are resampled whole instead; extraction does not
//! fail on unpitched material.
//!
//! The `spectral` method takes the magnitude spectrum of a Hann-windowed
//! frame and rebuilds a zero-phase cycle from it.

use std::f32::consts::PI;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use super::generator::from_spectrum;
use super::pitch::{estimate_period, prefix_squares, PeriodEstimate};
use super::resample::resample_cycle;
use super::table::{validate_table_size, Table};
use crate::config::{Config, ExtractionConfig};
use crate::error::{WavetableError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Pitch-synchronous single-cycle extraction
    #[default]
    Cycle,
    /// Zero-phase cycle from the frame's magnitude spectrum
    Spectral,
}

/// Outcome of one window extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub table: Table,
    pub method: ExtractionMethod,
    /// Period the cycle was cut at; always `None` for the spectral method
    pub period: Option<PeriodEstimate>,
}

impl Extraction {
    pub fn is_pitched(&self) -> bool {
        self.period.is_some()
    }

    /// The cycle method found no trusted period and resampled the whole window
    pub fn is_fallback(&self) -> bool {
        self.method == ExtractionMethod::Cycle && self.period.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CycleExtractor {
    table_size: usize,
    config: ExtractionConfig,
}

impl CycleExtractor {
    pub fn new(table_size: usize, config: ExtractionConfig) -> Result<Self> {
        validate_table_size(table_size)?;
        if config.fft_size < 2 || !config.fft_size.is_power_of_two() {
            return Err(WavetableError::config(format!(
                "FFT size must be a power of two of at least 2, got {}",
                config.fft_size
            )));
        }
        Ok(Self { table_size, config })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.table_size(), config.extraction.clone())
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract one table from `window`
    pub fn extract(&self, window: &[f32], sample_rate: u32) -> Result<Table> {
        Ok(self.extract_detailed(window, sample_rate)?.table)
    }

    /// Extract one table and report the period it was cut at
    pub fn extract_detailed(&self, window: &[f32], sample_rate: u32) -> Result<Extraction> {
        if sample_rate == 0 {
            return Err(WavetableError::config("Sample rate must be greater than 0"));
        }
        if window.iter().any(|s| !s.is_finite()) {
            return Err(WavetableError::audio("Window contains non-finite samples"));
        }

        match self.config.method {
            ExtractionMethod::Cycle => Ok(self.extract_cycle(window, sample_rate)),
            ExtractionMethod::Spectral => Ok(Extraction {
                table: self.extract_spectral(window)?,
                method: ExtractionMethod::Spectral,
                period: None,
            }),
        }
    }

    fn extract_cycle(&self, window: &[f32], sample_rate: u32) -> Extraction {
        match estimate_period(window, sample_rate, &self.config) {
            Some(estimate) if estimate.confidence >= self.config.confidence_threshold => {
                let cycle = read_cycle(window, estimate.period);
                Extraction {
                    table: Table::normalized(resample_cycle(&cycle, self.table_size)),
                    method: ExtractionMethod::Cycle,
                    period: Some(estimate),
                }
            }
            estimate => {
                if let Some(estimate) = estimate {
                    log::debug!(
                        "Period {:.2} rejected (confidence {:.3} < {:.3}), resampling whole window",
                        estimate.period, estimate.confidence, self.config.confidence_threshold
                    );
                }
                Extraction {
                    table: Table::normalized(resample_cycle(window, self.table_size)),
                    method: ExtractionMethod::Cycle,
                    period: None,
                }
            }
        }
    }

    fn extract_spectral(&self, window: &[f32]) -> Result<Table> {
        let fft_size = self.config.fft_size;

        let mut frame = vec![Complex::new(0.0f32, 0.0); fft_size];
        let offset = window.len().saturating_sub(fft_size) / 2;
        let used = &window[offset..window.len().min(offset + fft_size)];
        // taper spans the samples actually read, which may be fewer than fft_size
        let denom = used.len().saturating_sub(1).max(1) as f32;
        for (i, &x) in used.iter().enumerate() {
            let hann = 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos());
            frame[i] = Complex::new(x * hann, 0.0);
        }

        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(fft_size).process(&mut frame);

        let magnitudes: Vec<f32> = frame[..fft_size / 2].iter().map(|c| c.norm()).collect();
        from_spectrum(&magnitudes, self.table_size)
    }
}

/// Extract a table with the default extraction settings
pub fn extract(window: &[f32], sample_rate: u32, table_size: usize) -> Result<Table> {
    CycleExtractor::new(table_size, ExtractionConfig::default())?.extract(window, sample_rate)
}

/// Cut one period of `window`, `period.round()` samples long.
///
/// The cut is centered on the loudest period-length stretch of the window,
/// then moved to the closest ascending zero crossing so consecutive tables
/// share a phase origin.
fn read_cycle(window: &[f32], period: f32) -> Vec<f32> {
    let n = window.len();
    let native_len = (period.round() as usize).max(2);
    if n < native_len + 2 {
        return window.to_vec();
    }

    let latest_start = (n - 1) as f32 - period;
    let center = loudest_center(window, native_len);
    let start = (center as f32 - period / 2.0).clamp(0.0, latest_start);
    let start = nearest_rising_zero_crossing(window, start, period, latest_start).unwrap_or(start);

    let step = period / native_len as f32;
    (0..native_len)
        .map(|j| sample_at(window, start + j as f32 * step))
        .collect()
}

/// Center of the `width`-sample stretch with the most energy
fn loudest_center(window: &[f32], width: usize) -> usize {
    let squares = prefix_squares(window);
    let best_start = (0..=window.len() - width)
        .max_by(|&a, &b| {
            let ea = squares[a + width] - squares[a];
            let eb = squares[b + width] - squares[b];
            ea.partial_cmp(&eb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    best_start + width / 2
}

/// Fractional position of the ascending zero crossing closest to `around`,
/// searched within one period either side and no later than `latest`
fn nearest_rising_zero_crossing(window: &[f32], around: f32, period: f32, latest: f32) -> Option<f32> {
    let lo = (around - period).max(0.0).floor() as usize;
    let hi = ((around + period).min(latest).floor() as usize).min(window.len().saturating_sub(2));

    (lo..=hi)
        .filter(|&i| window[i] <= 0.0 && window[i + 1] > 0.0)
        .map(|i| i as f32 + -window[i] / (window[i + 1] - window[i]))
        .filter(|&pos| pos <= latest)
        .min_by(|a, b| {
            (a - around)
                .abs()
                .partial_cmp(&(b - around).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

fn sample_at(window: &[f32], pos: f32) -> f32 {
    let index = pos.floor() as usize;
    if index + 1 >= window.len() {
        return window[window.len() - 1];
    }
    let frac = pos - index as f32;
    window[index] + (window[index + 1] - window[index]) * frac
}
