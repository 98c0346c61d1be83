//! Wavetable Processing Pipeline

pub mod processor;

pub use processor::{PerformanceMetrics, ProcessingResult, StackExtraction, WavetableProcessor};
