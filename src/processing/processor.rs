//! Wavetable extraction pipeline

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use rayon::prelude::*;
use crate::audio::{read_wav_file, PcmBuffer};
use crate::config::Config;
use crate::error::{WavetableError, Result};
use crate::wavetable::{
    morph_stack, CycleExtractor, Extraction, ExtractionMethod, FrameSegmenter, SerializerConfig, Stack,
    StackSerializer, Window,
};

/// Stack extracted from one buffer, with per-window outcome counts
#[derive(Debug, Clone)]
pub struct StackExtraction {
    pub stack: Stack,
    pub method: ExtractionMethod,
    pub window_count: usize,
    /// Windows cut at a detected period
    pub pitched_windows: usize,
    /// Windows the cycle method resampled whole for lack of a reliable period
    pub fallback_windows: usize,
}

#[derive(Debug)]
pub struct WavetableProcessor {
    config: Config,
    segmenter: FrameSegmenter,
    extractor: CycleExtractor,
    thread_pool: Option<rayon::ThreadPool>,
}

impl WavetableProcessor {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let segmenter = FrameSegmenter::from_config(&config)?;
        let extractor = CycleExtractor::from_config(&config)?;

        let thread_pool = if config.processing.parallel && config.processing.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.processing.threads)
                .build()
                .map_err(|e| WavetableError::config(format!("Failed to build thread pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        log::debug!(
            "Processor ready: {} tables x {} samples, method {:?}, parallel {} ({} threads)",
            config.num_tables(),
            config.table_size(),
            config.extraction.method,
            config.processing.parallel,
            config.processing.threads
        );

        Ok(Self {
            config,
            segmenter,
            extractor,
            thread_pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Segment `buffer` and extract one table per window, in window order
    pub fn extract_stack(&self, buffer: &PcmBuffer) -> Result<StackExtraction> {
        let windows = self.segmenter.segment_buffer(buffer, self.config.num_tables())?;
        log::info!(
            "Segmented {:.2}s into {} windows of {} samples",
            buffer.duration(),
            windows.len(),
            windows.first().map(|w| w.length).unwrap_or(0)
        );

        let extractions = self.extract_windows(buffer, &windows)?;
        let method = self.config.extraction.method;
        let pitched_windows = extractions.iter().filter(|e| e.is_pitched()).count();
        let fallback_windows = extractions.iter().filter(|e| e.is_fallback()).count();
        if fallback_windows > 0 {
            log::warn!(
                "{} of {} windows had no reliable period, used whole-window cycles",
                fallback_windows,
                extractions.len()
            );
        }

        let stack = Stack::new(extractions.into_iter().map(|e| e.table).collect())?;
        match method {
            ExtractionMethod::Cycle => {
                log::info!("Extracted {} tables ({} pitched)", stack.len(), pitched_windows)
            }
            ExtractionMethod::Spectral => log::info!("Extracted {} spectral tables", stack.len()),
        }

        Ok(StackExtraction {
            stack,
            method,
            window_count: windows.len(),
            pitched_windows,
            fallback_windows,
        })
    }

    fn extract_windows(&self, buffer: &PcmBuffer, windows: &[Window]) -> Result<Vec<Extraction>> {
        let samples = buffer.samples();
        let sample_rate = buffer.sample_rate();
        let extractor = &self.extractor;
        let extract = |window: &Window| extractor.extract_detailed(window.slice(samples), sample_rate);

        if !self.config.processing.parallel {
            return windows.iter().map(extract).collect();
        }

        // collect keeps window order
        match &self.thread_pool {
            Some(pool) => pool.install(|| windows.par_iter().map(extract).collect()),
            None => windows.par_iter().map(extract).collect(),
        }
    }

    /// Extract the stack and apply the configured chain morph, if any
    pub fn process_buffer(&self, buffer: &PcmBuffer) -> Result<Stack> {
        Ok(self.process_buffer_detailed(buffer)?.stack)
    }

    fn process_buffer_detailed(&self, buffer: &PcmBuffer) -> Result<StackExtraction> {
        let mut extraction = self.extract_stack(buffer)?;

        if let Some(steps) = self.config.morph_steps() {
            let morphed = morph_stack(&extraction.stack, steps)?;
            log::info!(
                "Chain morph with {} steps: {} -> {} tables",
                steps,
                extraction.stack.len(),
                morphed.len()
            );
            extraction.stack = morphed;
        }

        Ok(extraction)
    }

    /// Read a recording, build its stack and write the wavetable file
    pub fn process_file(&self, input_path: &Path, output_path: &Path) -> Result<ProcessingResult> {
        let start_time = Instant::now();

        let (header, buffer) = read_wav_file(input_path)?;
        log::info!(
            "Loaded {}: {:.2}s, {} Hz, {} ch",
            input_path.display(),
            header.duration,
            header.sample_rate,
            header.channels
        );

        let extraction = self.process_buffer_detailed(&buffer)?;

        let serializer = StackSerializer::new(SerializerConfig::from_config(
            &self.config,
            Some(buffer.sample_rate()),
        ))?;
        serializer.write_to_file(&extraction.stack, output_path)?;

        let processing_time = start_time.elapsed();
        let metrics = PerformanceMetrics::new(
            &buffer,
            processing_time,
            &extraction,
            serializer.config().sample_rate,
        );

        Ok(ProcessingResult {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            processing_time,
            metrics,
        })
    }
}

#[derive(Debug)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub processing_time: Duration,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub input_duration_seconds: f64,
    pub processing_time_seconds: f64,
    pub real_time_factor: f64,
    pub input_sample_rate: u32,
    pub container_sample_rate: u32,
    pub method: ExtractionMethod,
    pub window_count: usize,
    pub pitched_windows: usize,
    pub fallback_windows: usize,
    pub table_count: usize,
    pub table_size: usize,
}

impl PerformanceMetrics {
    fn new(buffer: &PcmBuffer, processing_time: Duration, extraction: &StackExtraction, container_sample_rate: u32) -> Self {
        let duration = buffer.duration();
        let rtf = if duration > 0.0 {
            processing_time.as_secs_f64() / duration
        } else {
            0.0
        };

        Self {
            input_duration_seconds: duration,
            processing_time_seconds: processing_time.as_secs_f64(),
            real_time_factor: rtf,
            input_sample_rate: buffer.sample_rate(),
            container_sample_rate,
            method: extraction.method,
            window_count: extraction.window_count,
            pitched_windows: extraction.pitched_windows,
            fallback_windows: extraction.fallback_windows,
            table_count: extraction.stack.len(),
            table_size: extraction.stack.table_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn tone_buffer(freq: f32, seconds: f32) -> PcmBuffer {
        let samples: Vec<f32> = (0..(seconds * 44100.0) as usize)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / 44100.0).sin())
            .collect();
        PcmBuffer::new(samples, 44100).unwrap()
    }

    fn test_config(num_tables: usize, table_size: usize) -> Config {
        let mut config = Config::default();
        config.wavetable.num_tables = num_tables;
        config.wavetable.table_size = table_size;
        config
    }

    #[test]
    fn test_extract_stack() {
        let processor = WavetableProcessor::new(test_config(8, 512)).unwrap();
        let extraction = processor.extract_stack(&tone_buffer(220.0, 1.0)).unwrap();

        assert_eq!(extraction.stack.len(), 8);
        assert_eq!(extraction.stack.table_size(), 512);
        assert_eq!(extraction.window_count, 8);
        assert_eq!(extraction.pitched_windows, 8);
        assert_eq!(extraction.fallback_windows, 0);
    }

    #[test]
    fn test_spectral_extraction_reports_no_fallback() {
        let mut config = test_config(4, 512);
        config.extraction.method = ExtractionMethod::Spectral;
        let processor = WavetableProcessor::new(config).unwrap();
        let extraction = processor.extract_stack(&tone_buffer(220.0, 1.0)).unwrap();

        assert_eq!(extraction.stack.len(), 4);
        assert_eq!(extraction.method, ExtractionMethod::Spectral);
        assert_eq!(extraction.pitched_windows, 0);
        assert_eq!(extraction.fallback_windows, 0);
    }

    #[test]
    fn test_noise_counts_fallback_windows() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(11);
        let noise: Vec<f32> = (0..22050).map(|_| rng.gen_range(-0.5..0.5)).collect();
        let processor = WavetableProcessor::new(test_config(4, 256)).unwrap();
        let extraction = processor.extract_stack(&PcmBuffer::new(noise, 44100).unwrap()).unwrap();

        assert_eq!(extraction.method, ExtractionMethod::Cycle);
        assert_eq!(extraction.fallback_windows, extraction.window_count - extraction.pitched_windows);
        assert!(extraction.fallback_windows > 0);
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let buffer = tone_buffer(330.0, 0.5);

        let parallel = WavetableProcessor::new(test_config(6, 256)).unwrap();
        let mut serial_config = test_config(6, 256);
        serial_config.processing.parallel = false;
        let serial = WavetableProcessor::new(serial_config).unwrap();
        let mut pooled_config = test_config(6, 256);
        pooled_config.processing.threads = 1;
        let pooled = WavetableProcessor::new(pooled_config).unwrap();

        let expected = serial.process_buffer(&buffer).unwrap();
        assert_eq!(parallel.process_buffer(&buffer).unwrap(), expected);
        assert_eq!(pooled.process_buffer(&buffer).unwrap(), expected);
    }

    #[test]
    fn test_chain_morph_applied() {
        let mut config = test_config(4, 256);
        config.wavetable.morph_steps = Some(5);
        let processor = WavetableProcessor::new(config).unwrap();

        let stack = processor.process_buffer(&tone_buffer(440.0, 0.5)).unwrap();
        assert_eq!(stack.len(), (4 - 1) * (5 - 1) + 1);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let processor = WavetableProcessor::new(test_config(4, 2048)).unwrap();
        let buffer = PcmBuffer::new(vec![0.0; 1000], 44100).unwrap();
        assert!(matches!(
            processor.process_buffer(&buffer),
            Err(WavetableError::InsufficientAudio { available: 1000, required: 4410 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(WavetableProcessor::new(test_config(0, 2048)).is_err());
        assert!(WavetableProcessor::new(test_config(8, 1000)).is_err());
    }

    #[test]
    fn test_process_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("tone.wav");
        let output = dir.path().join("tables.wav");
        tone_buffer(110.0, 1.0)
            .save_to_file(&input, crate::audio::AudioFormat::Float32)
            .unwrap();

        let processor = WavetableProcessor::new(test_config(4, 1024)).unwrap();
        let result = processor.process_file(&input, &output).unwrap();

        assert_eq!(result.metrics.table_count, 4);
        assert_eq!(result.metrics.table_size, 1024);
        assert_eq!(result.metrics.container_sample_rate, 44100);
        assert_eq!(result.metrics.method, ExtractionMethod::Cycle);
        assert_eq!(result.metrics.fallback_windows, 0);
        assert!((result.metrics.input_duration_seconds - 1.0).abs() < 1e-6);

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.len(), 4 * 1024);
        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(crate::wavetable::read_clm_table_size(&bytes), Some(1024));
    }
}
