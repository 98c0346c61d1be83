//! Error Types

use thiserror::Error;

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum WavetableError {
    #[error("Invalid table size {size}: must be a positive power of two")]
    InvalidTableSize { size: usize },

    #[error("Insufficient audio: {available} samples available, at least {required} required")]
    InsufficientAudio { available: usize, required: usize },

    #[error("Invalid morph step count {steps}: at least 2 steps required")]
    InvalidStepCount { steps: usize },

    #[error("Table size mismatch: expected {expected} samples, found {found}")]
    TableSizeMismatch { expected: usize, found: usize },

    #[error("Cannot build a wavetable stack from zero tables")]
    EmptyStack,

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl WavetableError {
    pub fn audio<S: Into<String>>(msg: S) -> Self { Self::Audio { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { Self::Io { message: msg.into() } }

    /// True for errors caused by caller-supplied parameters rather than I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTableSize { .. }
                | Self::InsufficientAudio { .. }
                | Self::InvalidStepCount { .. }
                | Self::TableSizeMismatch { .. }
                | Self::EmptyStack
                | Self::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WavetableError>;

impl From<std::io::Error> for WavetableError {
    fn from(err: std::io::Error) -> Self { Self::io(err.to_string()) }
}

impl From<hound::Error> for WavetableError {
    fn from(err: hound::Error) -> Self { Self::audio(format!("WAV: {}", err)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = WavetableError::audio("test");
        assert!(e.to_string().contains("Audio"));

        let e = WavetableError::InvalidTableSize { size: 1000 };
        assert!(e.to_string().contains("1000"));

        let e = WavetableError::TableSizeMismatch { expected: 2048, found: 1024 };
        assert!(e.to_string().contains("2048"));
        assert!(e.to_string().contains("1024"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(WavetableError::EmptyStack.is_validation());
        assert!(WavetableError::InvalidStepCount { steps: 1 }.is_validation());
        assert!(WavetableError::config("bad").is_validation());
        assert!(!WavetableError::io("disk").is_validation());
        assert!(!WavetableError::audio("decode").is_validation());
    }
}
