//! Wavetable engine
//!
//! Segmentation, pitch-synchronous cycle extraction, band-limited resampling,
//! analytic generation, morphing and WAV serialization of table stacks.

pub mod extractor;
pub mod generator;
pub mod morph;
pub mod pitch;
pub mod resample;
pub mod segmenter;
pub mod serializer;
pub mod table;

pub use extractor::{extract, CycleExtractor, Extraction, ExtractionMethod};
pub use generator::{from_spectrum, generate, WaveShape};
pub use morph::{morph, morph_count, morph_stack};
pub use pitch::{estimate_period, PeriodEstimate};
pub use resample::{harmonic_limit, resample_cycle};
pub use segmenter::{FrameSegmenter, Window};
pub use serializer::{clm_payload, read_clm_table_size, SerializerConfig, StackSerializer};
pub use table::{validate_table_size, Stack, Table};
