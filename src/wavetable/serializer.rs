//! Wavetable WAV output
//!
//! A stack is written as one mono WAV with the tables back to back. The
//! frame length travels in a `clm ` chunk placed between `fmt ` and `data`,
//! the layout wavetable synthesizers look for; readers that do not know the
//! chunk skip it and see plain audio.

use std::io::Cursor;
use std::path::Path;
use crate::audio::AudioFormat;
use crate::config::{Config, DEFAULT_CONTAINER_SAMPLE_RATE, MAX_SAMPLE_RATE};
use crate::error::{WavetableError, Result};
use super::table::{validate_tables, Table};

const CLM_CHUNK_ID: &[u8; 4] = b"clm ";
const CLM_PREFIX: &str = "<!>";

/// Container parameters for a serialized stack
#[derive(Debug, Clone, PartialEq)]
pub struct SerializerConfig {
    pub sample_rate: u32,
    pub sample_format: AudioFormat,
    /// Write the `clm ` frame-length chunk
    pub embed_metadata: bool,
    /// Output gain applied before quantization, in (0, 1]
    pub peak_level: f32,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_CONTAINER_SAMPLE_RATE,
            sample_format: AudioFormat::Int16,
            embed_metadata: true,
            peak_level: 1.0,
        }
    }
}

impl SerializerConfig {
    /// Output settings from `config`, with the container rate falling back to
    /// `source_rate` when the config leaves it open
    pub fn from_config(config: &Config, source_rate: Option<u32>) -> Self {
        Self {
            sample_rate: config.container_sample_rate(source_rate),
            sample_format: config.output.sample_format,
            embed_metadata: config.output.embed_metadata,
            peak_level: config.output.peak_level,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StackSerializer {
    config: SerializerConfig,
}

impl StackSerializer {
    pub fn new(config: SerializerConfig) -> Result<Self> {
        if config.sample_rate == 0 || config.sample_rate > MAX_SAMPLE_RATE {
            return Err(WavetableError::config(format!(
                "Container sample rate must be in range [1, {}], got {}",
                MAX_SAMPLE_RATE, config.sample_rate
            )));
        }
        if !(config.peak_level > 0.0 && config.peak_level <= 1.0) {
            return Err(WavetableError::config("Peak level must be in range (0.0, 1.0]"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Encode `tables` as a complete WAV file
    pub fn serialize(&self, tables: &[Table]) -> Result<Vec<u8>> {
        let table_size = validate_tables(tables)?;

        let mut bytes = Vec::new();
        {
            let spec = self.config.sample_format.wav_spec(self.config.sample_rate);
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
            let gain = self.config.peak_level;

            match self.config.sample_format {
                AudioFormat::Int16 => {
                    for &sample in tables.iter().flat_map(|t| t.samples()) {
                        let value = ((sample * gain).clamp(-1.0, 1.0) * 32767.0).round() as i16;
                        writer.write_sample(value)?;
                    }
                }
                AudioFormat::Float32 => {
                    for &sample in tables.iter().flat_map(|t| t.samples()) {
                        writer.write_sample(sample * gain)?;
                    }
                }
            }
            writer.finalize()?;
        }

        if self.config.embed_metadata {
            insert_chunk_after_fmt(&mut bytes, CLM_CHUNK_ID, clm_payload(table_size).as_bytes())?;
        }

        log::debug!(
            "Serialized {} tables x {} samples ({}, {} Hz, {} bytes)",
            tables.len(),
            table_size,
            self.config.sample_format.name(),
            self.config.sample_rate,
            bytes.len()
        );

        Ok(bytes)
    }

    /// Encode `tables` and write them to `path`
    pub fn write_to_file<P: AsRef<Path>>(&self, tables: &[Table], path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.serialize(tables)?;
        std::fs::write(path, bytes)
            .map_err(|e| WavetableError::io(format!("Failed to write {}: {}", path.display(), e)))?;

        log::info!("Wrote {} tables to {}", tables.len(), path.display());
        Ok(())
    }
}

/// `clm ` chunk text for a frame length of `table_size`
pub fn clm_payload(table_size: usize) -> String {
    format!("{}{} 10000000 wavetable (wavetable-rs)", CLM_PREFIX, table_size)
}

/// Frame length declared by a `clm ` chunk in a WAV file, if there is one
pub fn read_clm_table_size(wav: &[u8]) -> Option<usize> {
    let (start, len) = riff_chunks(wav).find(|(id, _, _)| *id == CLM_CHUNK_ID).map(|(_, s, l)| (s, l))?;
    let text = std::str::from_utf8(&wav[start..start + len]).ok()?;
    let text = text.trim_end_matches('\0').strip_prefix(CLM_PREFIX)?;
    text.split_whitespace().next()?.parse().ok()
}

/// Iterate `(id, payload start, payload length)` over the chunks of a RIFF file
fn riff_chunks(wav: &[u8]) -> impl Iterator<Item = (&[u8], usize, usize)> {
    let valid = wav.len() >= 12 && &wav[0..4] == b"RIFF" && &wav[8..12] == b"WAVE";
    let mut pos = if valid { 12 } else { wav.len() };

    std::iter::from_fn(move || {
        if pos + 8 > wav.len() {
            return None;
        }
        let id = &wav[pos..pos + 4];
        let len = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]]) as usize;
        let start = pos + 8;
        if start + len > wav.len() {
            return None;
        }
        // chunks are word aligned
        pos = start + len + (len % 2);
        Some((id, start, len))
    })
}

fn insert_chunk_after_fmt(wav: &mut Vec<u8>, id: &[u8; 4], payload: &[u8]) -> Result<()> {
    let (fmt_start, fmt_len) = riff_chunks(wav)
        .find(|(chunk_id, _, _)| *chunk_id == b"fmt ")
        .map(|(_, s, l)| (s, l))
        .ok_or_else(|| WavetableError::audio("Encoded WAV has no fmt chunk"))?;
    let insert_at = fmt_start + fmt_len + (fmt_len % 2);

    // even-sized payload so no pad byte is needed after it
    let mut body = payload.to_vec();
    if body.len() % 2 == 1 {
        body.push(0);
    }

    let mut chunk = Vec::with_capacity(8 + body.len());
    chunk.extend_from_slice(id);
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&body);
    wav.splice(insert_at..insert_at, chunk);

    let riff_size = (wav.len() - 8) as u32;
    wav[4..8].copy_from_slice(&riff_size.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavetable::generator::{generate, WaveShape};

    fn tables(count: usize, size: usize) -> Vec<Table> {
        (0..count)
            .map(|i| generate(WaveShape::ALL[i % 3], size).unwrap())
            .collect()
    }

    fn read_back(bytes: &[u8]) -> (hound::WavSpec, Vec<f32>) {
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .map(|s| s.unwrap() as f32 / 32767.0)
                .collect(),
            hound::SampleFormat::Float => reader.samples::<f32>().map(|s| s.unwrap()).collect(),
        };
        (spec, samples)
    }

    #[test]
    fn test_sample_count_and_layout() {
        let serializer = StackSerializer::default();
        let stack = tables(4, 256);
        let bytes = serializer.serialize(&stack).unwrap();

        let (spec, samples) = read_back(&bytes);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples.len(), 4 * 256);

        for (k, table) in stack.iter().enumerate() {
            let frame = &samples[k * 256..(k + 1) * 256];
            for (a, b) in frame.iter().zip(table.samples()) {
                assert!((a - b).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_clm_chunk() {
        let bytes = StackSerializer::default().serialize(&tables(2, 2048)).unwrap();
        assert_eq!(read_clm_table_size(&bytes), Some(2048));
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize, bytes.len() - 8);

        let ids: Vec<&[u8]> = riff_chunks(&bytes).map(|(id, _, _)| id).collect();
        let fmt = ids.iter().position(|id| *id == b"fmt ").unwrap();
        let clm = ids.iter().position(|id| *id == b"clm ").unwrap();
        let data = ids.iter().position(|id| *id == b"data").unwrap();
        assert!(fmt < clm && clm < data);

        let plain = StackSerializer::new(SerializerConfig { embed_metadata: false, ..Default::default() })
            .unwrap()
            .serialize(&tables(2, 2048))
            .unwrap();
        assert_eq!(read_clm_table_size(&plain), None);
        let payload = clm_payload(2048).len();
        assert_eq!(plain.len() + 8 + payload + payload % 2, bytes.len());
    }

    #[test]
    fn test_float32_and_peak_level() {
        let serializer = StackSerializer::new(SerializerConfig {
            sample_rate: 48000,
            sample_format: AudioFormat::Float32,
            embed_metadata: true,
            peak_level: 0.5,
        })
        .unwrap();
        let stack = tables(3, 64);
        let bytes = serializer.serialize(&stack).unwrap();

        let (spec, samples) = read_back(&bytes);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(samples.len(), 3 * 64);
        assert_eq!(read_clm_table_size(&bytes), Some(64));

        let expected: Vec<f32> = stack.iter().flat_map(|t| t.samples().iter().map(|s| s * 0.5)).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_invalid_stacks() {
        let serializer = StackSerializer::default();
        assert!(matches!(serializer.serialize(&[]), Err(WavetableError::EmptyStack)));

        let mixed = vec![generate(WaveShape::Sine, 64).unwrap(), generate(WaveShape::Sine, 128).unwrap()];
        assert!(matches!(
            serializer.serialize(&mixed),
            Err(WavetableError::TableSizeMismatch { expected: 64, found: 128 })
        ));
    }

    #[test]
    fn test_invalid_config() {
        assert!(StackSerializer::new(SerializerConfig { sample_rate: 0, ..Default::default() }).is_err());
        assert!(StackSerializer::new(SerializerConfig { peak_level: 1.5, ..Default::default() }).is_err());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("table.wav");
        StackSerializer::default().write_to_file(&tables(2, 128), &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 256);
        assert_eq!(read_clm_table_size(&std::fs::read(&path).unwrap()), Some(128));
    }

    #[test]
    fn test_read_clm_rejects_garbage() {
        assert_eq!(read_clm_table_size(b""), None);
        assert_eq!(read_clm_table_size(b"RIFF\0\0\0\0WAVE"), None);
    }
}
