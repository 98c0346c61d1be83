//! Wavetable - Wavetable Extraction Library
//!
//! Turns recordings into stacks of single-cycle tables for wavetable
//! synthesizers, generates analytic tables and morphs between them.

pub mod audio;
pub mod config;
pub mod error;
pub mod processing;
pub mod wavetable;

pub use audio::{AudioFormat, PcmBuffer};
pub use config::{Args, Config};
pub use error::{WavetableError, Result};
pub use processing::WavetableProcessor;
pub use wavetable::{
    generate, morph, morph_stack, CycleExtractor, FrameSegmenter, StackSerializer, Stack, Table,
    WaveShape,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init()
        .ok();
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}
