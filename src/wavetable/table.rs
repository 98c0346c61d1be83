//! Single-cycle tables and ordered table stacks

use std::ops::Deref;
use ndarray::ArrayView1;
use rustfft::{num_complex::Complex, FftPlanner};
use crate::error::{WavetableError, Result};

/// Peak level below which a cycle is treated as silence
pub const SILENCE_THRESHOLD: f32 = 1e-10;

/// Reject sizes that are zero or not a power of two
pub fn validate_table_size(size: usize) -> Result<()> {
    if size == 0 || !size.is_power_of_two() {
        return Err(WavetableError::InvalidTableSize { size });
    }
    Ok(())
}

/// One normalized, DC-free single cycle.
///
/// Tables are values: nothing hands out mutable access to the samples, every
/// transformation builds a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    samples: Vec<f32>,
}

impl Table {
    /// Normalize arbitrary samples into a table.
    ///
    /// The length must be a power of two. The mean is removed and the result
    /// scaled to a peak of 1.0; a cycle with no energy becomes all zeros.
    pub fn from_samples(samples: Vec<f32>) -> Result<Self> {
        validate_table_size(samples.len())?;
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(WavetableError::audio("Table samples must be finite"));
        }
        Ok(Self::normalized(samples))
    }

    /// All-zero table, the image of silence
    pub fn zeros(size: usize) -> Result<Self> {
        validate_table_size(size)?;
        Ok(Self { samples: vec![0.0; size] })
    }

    pub(crate) fn normalized(mut samples: Vec<f32>) -> Self {
        remove_dc(&mut samples);
        scale_to_unit_peak(&mut samples);
        Self { samples }
    }

    /// Wrap samples that already satisfy the table invariants
    pub(crate) fn from_raw(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
    }

    pub fn mean(&self) -> f32 {
        ArrayView1::from(&self.samples[..]).mean().unwrap_or(0.0)
    }

    pub fn is_silent(&self) -> bool {
        self.peak() < SILENCE_THRESHOLD
    }

    /// Harmonic amplitudes, index 0 is DC, index k the k-th harmonic
    pub fn harmonic_magnitudes(&self) -> Vec<f32> {
        let n = self.samples.len();
        if n == 0 {
            return Vec::new();
        }

        let mut buffer: Vec<Complex<f32>> = self.samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(n).process(&mut buffer);

        let scale = 2.0 / n as f32;
        buffer[..=n / 2].iter().map(|c| c.norm() * scale).collect()
    }

    /// Harmonic with the most energy, ignoring DC
    pub fn dominant_harmonic(&self) -> Option<usize> {
        let magnitudes = self.harmonic_magnitudes();
        magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, m)| **m > SILENCE_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, _)| k)
    }

    /// Share of energy above the fundamental, in [0, 1]
    pub fn high_frequency_ratio(&self) -> f32 {
        let magnitudes = self.harmonic_magnitudes();
        if magnitudes.len() < 2 {
            return 0.0;
        }
        let energy = |m: &f32| m * m;
        let total: f32 = magnitudes[1..].iter().map(energy).sum();
        if total < SILENCE_THRESHOLD {
            return 0.0;
        }
        magnitudes[2..].iter().map(energy).sum::<f32>() / total
    }
}

impl AsRef<[f32]> for Table {
    fn as_ref(&self) -> &[f32] {
        &self.samples
    }
}

pub(crate) fn remove_dc(samples: &mut [f32]) {
    let mean = ArrayView1::from(&*samples).mean().unwrap_or(0.0);
    samples.iter_mut().for_each(|s| *s -= mean);
}

pub(crate) fn scale_to_unit_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |p, s| p.max(s.abs()));
    if peak < SILENCE_THRESHOLD {
        samples.iter_mut().for_each(|s| *s = 0.0);
    } else {
        samples.iter_mut().for_each(|s| *s /= peak);
    }
}

/// Check a table sequence for stack invariants, returning the shared length
pub fn validate_tables(tables: &[Table]) -> Result<usize> {
    let first = tables.first().ok_or(WavetableError::EmptyStack)?;
    let expected = first.len();
    if let Some(bad) = tables.iter().find(|t| t.len() != expected) {
        return Err(WavetableError::TableSizeMismatch { expected, found: bad.len() });
    }
    Ok(expected)
}

/// Ordered, non-empty run of equal-length tables
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    tables: Vec<Table>,
}

impl Stack {
    pub fn new(tables: Vec<Table>) -> Result<Self> {
        validate_tables(&tables)?;
        Ok(Self { tables })
    }

    pub fn single(table: Table) -> Self {
        Self { tables: vec![table] }
    }

    pub fn table_size(&self) -> usize {
        self.tables[0].len()
    }

    pub fn total_samples(&self) -> usize {
        self.tables.len() * self.table_size()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// All tables back to back
    pub fn flatten(&self) -> Vec<f32> {
        self.tables.iter().flat_map(|t| t.samples().iter().copied()).collect()
    }
}

impl Deref for Stack {
    type Target = [Table];

    fn deref(&self) -> &[Table] {
        &self.tables
    }
}
