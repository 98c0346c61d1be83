//! Frame segmentation
//!
//! Picks `num_tables` evenly spaced analysis windows across a buffer. Every
//! window has the same length: long enough to hold `min_periods` cycles of
//! the lowest detectable frequency and never shorter than one table. When the
//! buffer is short relative to the table count, windows overlap rather than
//! shrink.

use crate::audio::PcmBuffer;
use crate::config::{Config, ExtractionConfig};
use crate::error::{WavetableError, Result};
use super::table::validate_table_size;

/// Analysis window over a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Ordinal position, which is also the table index it produces
    pub index: usize,
    /// First sample
    pub start: usize,
    /// Length in samples
    pub length: usize,
}

impl Window {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Borrow the window's samples from `samples`
    pub fn slice<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        let end = self.end().min(samples.len());
        &samples[self.start.min(end)..end]
    }
}

#[derive(Debug, Clone)]
pub struct FrameSegmenter {
    table_size: usize,
    min_frequency: f32,
    min_periods: usize,
}

impl FrameSegmenter {
    pub fn new(table_size: usize, extraction: &ExtractionConfig) -> Result<Self> {
        validate_table_size(table_size)?;
        if !(extraction.min_frequency > 0.0) {
            return Err(WavetableError::config("Minimum frequency must be greater than 0"));
        }
        Ok(Self {
            table_size,
            min_frequency: extraction.min_frequency,
            min_periods: extraction.min_periods.max(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.table_size(), &config.extraction)
    }

    /// Shortest window that can carry a confident period estimate
    pub fn min_window_len(&self, sample_rate: u32) -> usize {
        let periods = self.min_periods as f64 * sample_rate as f64 / self.min_frequency as f64;
        (periods.ceil() as usize).max(self.table_size)
    }

    /// Windows for a buffer of `buffer_len` samples at `sample_rate`
    pub fn segment(&self, buffer_len: usize, sample_rate: u32, num_tables: usize) -> Result<Vec<Window>> {
        if num_tables == 0 {
            return Err(WavetableError::config("Table count must be at least 1"));
        }
        if sample_rate == 0 {
            return Err(WavetableError::config("Sample rate must be greater than 0"));
        }

        let window_len = self.min_window_len(sample_rate);
        if buffer_len < window_len {
            return Err(WavetableError::InsufficientAudio {
                available: buffer_len,
                required: window_len,
            });
        }

        let slack = buffer_len - window_len;
        let windows: Vec<Window> = if num_tables == 1 {
            vec![Window { index: 0, start: slack / 2, length: window_len }]
        } else {
            let spacing = slack as f64 / (num_tables - 1) as f64;
            (0..num_tables)
                .map(|index| Window {
                    index,
                    start: ((index as f64 * spacing).round() as usize).min(slack),
                    length: window_len,
                })
                .collect()
        };

        log::debug!(
            "Segmented {} samples into {} windows of {} samples (spacing {:.1})",
            buffer_len,
            windows.len(),
            window_len,
            if num_tables > 1 { slack as f64 / (num_tables - 1) as f64 } else { 0.0 }
        );

        Ok(windows)
    }

    /// Windows for a decoded buffer
    pub fn segment_buffer(&self, buffer: &PcmBuffer, num_tables: usize) -> Result<Vec<Window>> {
        self.segment(buffer.len(), buffer.sample_rate(), num_tables)
    }
}
