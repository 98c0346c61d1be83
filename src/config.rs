//! Configuration management for wavetable extraction

use crate::audio::AudioFormat;
use crate::error::{WavetableError, Result};
use crate::wavetable::{ExtractionMethod, WaveShape};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of tables in an extracted stack
pub const DEFAULT_NUM_TABLES: usize = 64;
/// Default samples per table
pub const DEFAULT_TABLE_SIZE: usize = 2048;
/// Default morph granularity for the `morph` command
pub const DEFAULT_MORPH_STEPS: usize = 16;
/// Container rate used when no source recording supplies one
pub const DEFAULT_CONTAINER_SAMPLE_RATE: u32 = 44100;

pub const MIN_TABLE_SIZE: usize = 16;
pub const MAX_TABLE_SIZE: usize = 65536;
pub const MAX_SAMPLE_RATE: u32 = 192000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wavetable: WavetableConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    pub processing: ProcessingConfig,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavetableConfig {
    pub table_size: usize,
    pub num_tables: usize,
    /// Chained morph granularity applied after extraction, if any
    pub morph_steps: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub method: ExtractionMethod,
    /// Lowest fundamental considered by the period search (Hz)
    pub min_frequency: f32,
    /// Highest fundamental considered by the period search (Hz)
    pub max_frequency: f32,
    /// NSDF peak value required to trust a period estimate
    pub confidence_threshold: f32,
    /// Periods of `min_frequency` every analysis window must hold
    pub min_periods: usize,
    /// FFT size for the spectral extraction method
    pub fft_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Container sample rate; the source rate when unset
    pub sample_rate: Option<u32>,
    pub sample_format: AudioFormat,
    /// Write the `clm ` chunk carrying the table size
    pub embed_metadata: bool,
    pub peak_level: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub parallel: bool,
    /// Worker threads for parallel extraction, 0 = rayon default
    pub threads: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wavetable: WavetableConfig::default(),
            extraction: ExtractionConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
            input_path: PathBuf::from("input.wav"),
            output_path: PathBuf::from("wavetables.wav"),
        }
    }
}

impl Default for WavetableConfig {
    fn default() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
            num_tables: DEFAULT_NUM_TABLES,
            morph_steps: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            method: ExtractionMethod::Cycle,
            min_frequency: 20.0,
            max_frequency: 5000.0,
            confidence_threshold: 0.6,
            min_periods: 2,
            fft_size: 2048,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            sample_format: AudioFormat::Int16,
            embed_metadata: true,
            peak_level: 1.0,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: 0,
            verbose: false,
        }
    }
}

impl Config {
    pub fn table_size(&self) -> usize {
        self.wavetable.table_size
    }

    pub fn num_tables(&self) -> usize {
        self.wavetable.num_tables
    }

    pub fn morph_steps(&self) -> Option<usize> {
        self.wavetable.morph_steps
    }

    pub fn verbose(&self) -> bool {
        self.processing.verbose
    }

    /// Container rate for a stack extracted from audio at `source_rate`
    pub fn container_sample_rate(&self, source_rate: Option<u32>) -> u32 {
        self.output
            .sample_rate
            .or(source_rate)
            .unwrap_or(DEFAULT_CONTAINER_SAMPLE_RATE)
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WavetableError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| WavetableError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Validate configuration parameter validity
    pub fn validate(&self) -> Result<()> {
        let table_size = self.wavetable.table_size;
        if table_size == 0 || !table_size.is_power_of_two() {
            return Err(WavetableError::InvalidTableSize { size: table_size });
        }
        if !(MIN_TABLE_SIZE..=MAX_TABLE_SIZE).contains(&table_size) {
            return Err(WavetableError::config(format!(
                "Table size must be in range [{}, {}]",
                MIN_TABLE_SIZE, MAX_TABLE_SIZE
            )));
        }

        if self.wavetable.num_tables == 0 {
            return Err(WavetableError::config("Table count must be at least 1"));
        }
        if let Some(steps) = self.wavetable.morph_steps {
            if steps < 2 {
                return Err(WavetableError::InvalidStepCount { steps });
            }
        }

        let extraction = &self.extraction;
        if !(extraction.min_frequency > 0.0) {
            return Err(WavetableError::config("Minimum frequency must be greater than 0"));
        }
        if extraction.max_frequency <= extraction.min_frequency {
            return Err(WavetableError::config(
                "Maximum frequency must exceed minimum frequency",
            ));
        }
        if !(0.0..=1.0).contains(&extraction.confidence_threshold) {
            return Err(WavetableError::config("Confidence threshold must be in range [0.0, 1.0]"));
        }
        if extraction.min_periods == 0 {
            return Err(WavetableError::config("Minimum periods must be at least 1"));
        }
        if extraction.fft_size < 4 || !extraction.fft_size.is_power_of_two() {
            return Err(WavetableError::config("FFT size must be a power of two of at least 4"));
        }

        if let Some(rate) = self.output.sample_rate {
            if rate == 0 {
                return Err(WavetableError::config("Sample rate must be greater than 0"));
            }
            if rate > MAX_SAMPLE_RATE {
                return Err(WavetableError::config("Sample rate cannot exceed 192000 Hz"));
            }
        }
        if !(self.output.peak_level > 0.0 && self.output.peak_level <= 1.0) {
            return Err(WavetableError::config("Peak level must be in range (0.0, 1.0]"));
        }

        if self.processing.threads > num_cpus::get() * 2 {
            return Err(WavetableError::config(
                "Thread count cannot exceed 2x logical CPU cores",
            ));
        }

        Ok(())
    }

    /// Save config to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WavetableError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| WavetableError::config(format!("Failed to write config file: {}", e)))
    }

    /// Create default config file
    pub fn create_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }

    fn load_base(config_file: Option<&Path>) -> Result<Self> {
        match config_file {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the extraction config: file first, command line flags on top
    pub fn from_extract_args(args: &ExtractArgs, config_file: Option<&Path>, verbose: bool) -> Result<Self> {
        let mut config = Self::load_base(config_file)?;

        config.input_path = args.input.clone();
        config.output_path = args.output.clone();
        if let Some(n) = args.num_tables {
            config.wavetable.num_tables = n;
        }
        if let Some(size) = args.table_size {
            config.wavetable.table_size = size;
        }
        if args.morph_steps.is_some() {
            config.wavetable.morph_steps = args.morph_steps;
        }
        if let Some(method) = args.method {
            config.extraction.method = method;
        }
        if args.sample_rate.is_some() {
            config.output.sample_rate = args.sample_rate;
        }
        if let Some(format) = args.format {
            config.output.sample_format = format;
        }
        if args.no_metadata {
            config.output.embed_metadata = false;
        }
        if args.serial {
            config.processing.parallel = false;
        }
        if let Some(threads) = args.threads {
            config.processing.threads = threads;
        }
        config.processing.verbose |= verbose;

        config.validate()?;
        Ok(config)
    }

    /// Build the config for commands that write tables without a source recording
    pub fn from_output_args(
        output: &Path,
        table_size: Option<usize>,
        format: Option<AudioFormat>,
        config_file: Option<&Path>,
        verbose: bool,
    ) -> Result<Self> {
        let mut config = Self::load_base(config_file)?;

        config.output_path = output.to_path_buf();
        if let Some(size) = table_size {
            config.wavetable.table_size = size;
        }
        if let Some(format) = format {
            config.output.sample_format = format;
        }
        config.processing.verbose |= verbose;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Parser)]
#[command(name = "wavetable", about = "Wavetable extractor for wavetable synthesizers", version, author)]
pub struct Args {
    #[arg(short = 'v', long = "verbose", global = true, help = "Enable verbose output mode")]
    pub verbose: bool,

    #[arg(short = 'c', long = "config", global = true, help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract a wavetable stack from a recording
    Extract(ExtractArgs),
    /// Write one analytic waveform as a single-table file
    Generate(GenerateArgs),
    /// Morph between two analytic waveforms
    Morph(MorphArgs),
    /// Write the default configuration to a TOML file
    InitConfig {
        #[arg(help = "Destination path for the config file")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ExtractArgs {
    #[arg(short = 'i', long = "input", help = "Input audio file path (WAV format)")]
    pub input: PathBuf,

    #[arg(short = 'o', long = "output", default_value = "wavetables.wav", help = "Output wavetable file path")]
    pub output: PathBuf,

    #[arg(short = 'n', long = "num-tables", help = "Number of tables in the stack [default: 64]")]
    pub num_tables: Option<usize>,

    #[arg(short = 's', long = "table-size", help = "Samples per table, power of two [default: 2048]")]
    pub table_size: Option<usize>,

    #[arg(long = "method", value_enum, help = "Extraction method [default: cycle]")]
    pub method: Option<ExtractionMethod>,

    #[arg(long = "morph-steps", help = "Chain-morph the extracted stack with this many steps per segment")]
    pub morph_steps: Option<usize>,

    #[arg(short = 'r', long = "sample-rate", help = "Container sample rate (Hz), defaults to the source rate")]
    pub sample_rate: Option<u32>,

    #[arg(short = 'f', long = "format", value_enum, help = "Output sample format [default: int16]")]
    pub format: Option<AudioFormat>,

    #[arg(long = "no-metadata", help = "Omit the clm chunk carrying the table size")]
    pub no_metadata: bool,

    #[arg(long = "serial", help = "Extract windows on the calling thread only")]
    pub serial: bool,

    #[arg(long = "threads", help = "Worker threads for parallel extraction (0 = all cores)")]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct GenerateArgs {
    #[arg(value_enum, help = "Waveform shape")]
    pub shape: WaveShape,

    #[arg(short = 'o', long = "output", help = "Output wavetable file path")]
    pub output: PathBuf,

    #[arg(short = 's', long = "table-size", help = "Samples per table, power of two [default: 2048]")]
    pub table_size: Option<usize>,

    #[arg(short = 'f', long = "format", value_enum, help = "Output sample format [default: int16]")]
    pub format: Option<AudioFormat>,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct MorphArgs {
    #[arg(value_enum, help = "Start waveform")]
    pub from: WaveShape,

    #[arg(value_enum, help = "End waveform")]
    pub to: WaveShape,

    #[arg(short = 'o', long = "output", help = "Output wavetable file path")]
    pub output: PathBuf,

    #[arg(long = "steps", default_value_t = DEFAULT_MORPH_STEPS, help = "Number of tables in the morph")]
    pub steps: usize,

    #[arg(short = 's', long = "table-size", help = "Samples per table, power of two [default: 2048]")]
    pub table_size: Option<usize>,

    #[arg(short = 'f', long = "format", value_enum, help = "Output sample format [default: int16]")]
    pub format: Option<AudioFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extract_args() -> ExtractArgs {
        ExtractArgs {
            input: PathBuf::from("in.wav"),
            output: PathBuf::from("out.wav"),
            num_tables: None,
            table_size: None,
            method: None,
            morph_steps: None,
            sample_rate: None,
            format: None,
            no_metadata: false,
            serial: false,
            threads: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.table_size(), 2048);
        assert_eq!(config.num_tables(), 64);
        assert_eq!(config.morph_steps(), None);
        assert_eq!(config.extraction.method, ExtractionMethod::Cycle);
        assert_eq!(config.output.sample_format, AudioFormat::Int16);
        assert!(config.output.embed_metadata);
        assert!(config.processing.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.wavetable.table_size = 1000;
        assert!(matches!(config.validate(), Err(WavetableError::InvalidTableSize { size: 1000 })));
        config.wavetable.table_size = 8;
        assert!(config.validate().is_err());
        config.wavetable.table_size = 2048;

        config.wavetable.num_tables = 0;
        assert!(config.validate().is_err());
        config.wavetable.num_tables = 8;

        config.wavetable.morph_steps = Some(1);
        assert!(matches!(config.validate(), Err(WavetableError::InvalidStepCount { steps: 1 })));
        config.wavetable.morph_steps = Some(4);

        config.extraction.max_frequency = 10.0;
        assert!(config.validate().is_err());
        config.extraction.max_frequency = 5000.0;

        config.extraction.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.extraction.confidence_threshold = 0.6;

        config.output.peak_level = 0.0;
        assert!(config.validate().is_err());
        config.output.peak_level = 0.9;

        config.output.sample_rate = Some(400_000);
        assert!(config.validate().is_err());
        config.output.sample_rate = Some(48000);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.wavetable.morph_steps = Some(4);
        config.output.sample_format = AudioFormat::Float32;
        config.extraction.method = ExtractionMethod::Spectral;

        assert!(config.save_to_file(&config_path).is_ok());
        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path).unwrap();
        assert_eq!(config, loaded_config);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "[wavetable]\nnum_tables = 8\n").unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.num_tables(), 8);
        assert_eq!(config.table_size(), DEFAULT_TABLE_SIZE);
    }

    #[test]
    fn test_command_line_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[wavetable]\nnum_tables = 8\ntable_size = 512\n").unwrap();

        let mut args = extract_args();
        args.table_size = Some(1024);
        args.serial = true;
        let config = Config::from_extract_args(&args, Some(&config_path), true).unwrap();

        assert_eq!(config.num_tables(), 8);
        assert_eq!(config.table_size(), 1024);
        assert!(!config.processing.parallel);
        assert!(config.verbose());
        assert_eq!(config.input_path, PathBuf::from("in.wav"));
    }

    #[test]
    fn test_container_sample_rate() {
        let mut config = Config::default();
        assert_eq!(config.container_sample_rate(Some(48000)), 48000);
        assert_eq!(config.container_sample_rate(None), DEFAULT_CONTAINER_SAMPLE_RATE);
        config.output.sample_rate = Some(22050);
        assert_eq!(config.container_sample_rate(Some(48000)), 22050);
    }
}
