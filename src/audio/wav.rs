//! WAV audio file input

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use hound::{SampleFormat, WavReader, WavWriter};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use crate::error::{WavetableError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Int16,
    Float32,
}

impl AudioFormat {
    pub fn name(&self) -> &'static str {
        match self {
            AudioFormat::Int16 => "int16",
            AudioFormat::Float32 => "float32",
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        match self {
            AudioFormat::Int16 => 2,
            AudioFormat::Float32 => 4,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bytes_per_sample() * 8
    }

    pub fn to_sample_format(self) -> SampleFormat {
        match self {
            AudioFormat::Int16 => SampleFormat::Int,
            AudioFormat::Float32 => SampleFormat::Float,
        }
    }

    pub fn wav_spec(self, sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: self.bits_per_sample(),
            sample_format: self.to_sample_format(),
        }
    }
}

/// Properties of a decoded source file
#[derive(Debug, Clone)]
pub struct AudioHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
    pub total_frames: usize,
    pub duration: f64,
}

/// Mono PCM samples at a known sample rate.
///
/// This is the input contract of the wavetable engine: decoded, downmixed,
/// immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(WavetableError::audio("Sample rate cannot be 0"));
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(WavetableError::audio(format!(
                "Audio data at position {} is not a finite number", i
            )));
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Decode a WAV file and downmix it to mono
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (_, buffer) = read_wav_file(path)?;
        Ok(buffer)
    }

    /// Write the buffer as a mono WAV file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: AudioFormat) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WavetableError::audio(format!("Cannot create output directory: {}", e)))?;
        }

        let mut writer = WavWriter::create(path, format.wav_spec(self.sample_rate))
            .map_err(|e| WavetableError::audio(format!(
                "Cannot create output file {}: {}", path.display(), e
            )))?;

        for &sample in &self.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            match format {
                AudioFormat::Float32 => writer.write_sample(clamped)?,
                AudioFormat::Int16 => writer.write_sample((clamped * 32767.0).round() as i16)?,
            }
        }

        writer.finalize()
            .map_err(|e| WavetableError::audio(format!("Failed to finalize WAV writing: {}", e)))
    }
}

/// Read a WAV file, returning its header and the mono downmix
pub fn read_wav_file<P: AsRef<Path>>(path: P) -> Result<(AudioHeader, PcmBuffer)> {
    let path = path.as_ref();

    let file = File::open(path)
        .map_err(|e| WavetableError::audio(format!(
            "Cannot open audio file {}: {}", path.display(), e
        )))?;

    let reader = WavReader::new(BufReader::new(file))
        .map_err(|e| WavetableError::audio(format!("Cannot create WAV reader: {}", e)))?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(WavetableError::audio("Invalid sample rate"));
    }
    if spec.channels == 0 {
        return Err(WavetableError::audio("WAV file declares zero channels"));
    }

    let interleaved = decode_samples(reader)?;
    let channels = spec.channels as usize;
    let total_frames = interleaved.len() / channels;

    let mono = if channels == 1 {
        interleaved
    } else {
        let frames = Array2::from_shape_vec((total_frames, channels), interleaved[..total_frames * channels].to_vec())
            .map_err(|e| WavetableError::audio(format!("Malformed interleaved data: {}", e)))?;
        match frames.mean_axis(Axis(1)) {
            Some(mean) => mean.to_vec(),
            None => Vec::new(),
        }
    };

    let header = AudioHeader {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        sample_format: spec.sample_format,
        total_frames,
        duration: total_frames as f64 / spec.sample_rate as f64,
    };

    log::debug!(
        "Decoded {}: {} Hz, {} ch, {}-bit {:?}, {:.2}s",
        path.display(), header.sample_rate, header.channels,
        header.bits_per_sample, header.sample_format, header.duration
    );

    Ok((header, PcmBuffer::new(mono, spec.sample_rate)?))
}

fn decode_samples<R: std::io::Read>(reader: WavReader<R>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    let read_err = |e: hound::Error| WavetableError::audio(format!("Failed to read sample: {}", e));

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(read_err))
            .collect(),
        (SampleFormat::Int, 8) => reader
            .into_samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0).map_err(read_err))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0).map_err(read_err))
            .collect(),
        (format, bits) => Err(WavetableError::audio(format!(
            "Unsupported WAV format: {:?} {}-bit", format, bits
        ))),
    }
}
