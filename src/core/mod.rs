//! Core analysis modules: audio contract, ingestion, DSP, detectors and orchestration

pub mod analysis;
pub mod audio;
pub mod cancel;
pub mod decoder;
pub mod dsp;
pub mod pipeline;

pub use audio::{AudioBuffer, Samples};
pub use cancel::CancelToken;
pub use decoder::{load, load_with_options, LoadOptions};
pub use pipeline::{analyze_file, Pipeline};
