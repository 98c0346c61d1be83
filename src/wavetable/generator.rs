//! Analytic waveform tables
//!
//! Every shape starts on an ascending zero crossing at sample 0, has zero mean
//! by construction and a peak of exactly 1.0 (for tables of 4 samples or more).

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use super::table::{scale_to_unit_peak, validate_table_size, Table};
use crate::error::{WavetableError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WaveShape {
    Sine,
    #[serde(alias = "sawtooth")]
    #[value(alias = "sawtooth")]
    Saw,
    Square,
}

impl WaveShape {
    pub const ALL: [WaveShape; 3] = [WaveShape::Sine, WaveShape::Saw, WaveShape::Square];

    pub fn name(&self) -> &'static str {
        match self {
            WaveShape::Sine => "sine",
            WaveShape::Saw => "saw",
            WaveShape::Square => "square",
        }
    }
}

impl fmt::Display for WaveShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveShape {
    type Err = WavetableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(WaveShape::Sine),
            "saw" | "sawtooth" => Ok(WaveShape::Saw),
            "square" | "sqr" => Ok(WaveShape::Square),
            other => Err(WavetableError::config(format!("Unknown waveform shape: {}", other))),
        }
    }
}

/// Build one cycle of `shape` with `table_size` samples
pub fn generate(shape: WaveShape, table_size: usize) -> Result<Table> {
    validate_table_size(table_size)?;

    let mut samples = match shape {
        WaveShape::Sine => sine(table_size),
        WaveShape::Saw => saw(table_size),
        WaveShape::Square => square(table_size),
    };
    scale_to_unit_peak(&mut samples);

    Ok(Table::from_raw(samples))
}

fn sine(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * i as f64 / n as f64).sin() as f32)
        .collect()
}

// Rising ramp with the wrap at the half-cycle; the sample on the jump sits at
// its midpoint, which keeps the cycle antisymmetric.
fn saw(n: usize) -> Vec<f32> {
    let half = n / 2;
    (0..n)
        .map(|i| {
            if i < half {
                i as f32 / half as f32
            } else if i == half {
                0.0
            } else {
                (i as f32 - n as f32) / half as f32
            }
        })
        .collect()
}

fn square(n: usize) -> Vec<f32> {
    let half = n / 2;
    (0..n)
        .map(|i| {
            if i == 0 || i == half {
                0.0
            } else if i < half {
                1.0
            } else {
                -1.0
            }
        })
        .collect()
}

/// Build a zero-phase cycle from a magnitude spectrum.
///
/// `magnitudes[k]` is the amplitude of harmonic `k`; bins at or beyond
/// `table_size / 2` are dropped, as is DC.
pub fn from_spectrum(magnitudes: &[f32], table_size: usize) -> Result<Table> {
    validate_table_size(table_size)?;
    if magnitudes.iter().any(|m| !m.is_finite()) {
        return Err(WavetableError::audio("Spectrum magnitudes must be finite"));
    }

    let mut spectrum = vec![Complex::new(0.0f32, 0.0); table_size];
    let usable = magnitudes.len().min(table_size / 2);
    for k in 1..usable {
        let bin = Complex::new(magnitudes[k], 0.0);
        spectrum[k] = bin;
        spectrum[table_size - k] = bin.conj();
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(table_size).process(&mut spectrum);

    let samples = spectrum.iter().map(|c| c.re / table_size as f32).collect();
    Ok(Table::normalized(samples))
}
