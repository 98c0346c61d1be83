//! Audio Input Module
//!
//! Decodes WAV files into the mono PCM buffers the wavetable engine consumes.

pub mod wav;

pub use wav::{AudioFormat, AudioHeader, PcmBuffer, read_wav_file};
