//! FrequenCipher - Forensic analysis of audio recordings
//!
//! Runs a fixed battery of signal-processing detectors over one decoded
//! buffer and reports numeric cues for hidden or manipulated content.
//!
//! ## Features
//!
//! - **Spectral engine**: STFT, mel, MFCC, chroma, centroid, bandwidth, contrast, rolloff
//! - **Phase analysis**: inter-frame phase differences and coherence
//! - **Backmasking**: correlation between the signal and its time reversal
//! - **Subliminal bands**: infrasonic and ultrasonic energy, envelope and FM summaries
//! - **Steganography**: LSB and bit-plane statistics on the quantized signal
//! - **Watermarking**: spectral flatness against tonal stability
//! - **Temporal**: zero-crossing rate, tempo and beat intervals
//! - **Anomaly scoring**: isolation forest or z-score over the spectral summary
//!
//! ## Module Structure
//!
//! - `core` - Audio contract, ingestion, DSP, detectors and the pipeline
//! - `cli` - Command-line interface
//! - `config` - Analysis configuration
//! - `detection` - Result types
//! - `error` - Error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use frequencipher::{AnalysisConfig, AudioBuffer, Pipeline};
//!
//! let buffer = AudioBuffer::mono(samples, 44100)?;
//! let result = Pipeline::new(AnalysisConfig::default()).run(&buffer)?;
//!
//! println!("{}", result.to_json_pretty()?);
//! ```
//!
//! Every detector writes a fixed set of metric keys. A detector that fails
//! reports the same keys with NaN values plus `stage_failed`, and the other
//! stages still complete.

// Core analysis functionality
pub mod core;

// Command-line interface
pub mod cli;

// Configuration
pub mod config;

// Detection result types
pub mod detection;

pub mod error;

pub use config::{AnalysisConfig, AnalysisConfigBuilder, ScorerKind, SpectralConfig, Stage};
pub use core::analysis::{
    AnomalyScorer, Detector, DetectorInput, FeatureMatrix, SpectralEngine, SpectralFeatures,
};
pub use core::{
    analyze_file, load, load_with_options, AudioBuffer, CancelToken, LoadOptions, Pipeline,
    Samples,
};
pub use detection::{AnalysisResult, DetectorResult, ResultValue, STAGE_FAILED_KEY};
pub use error::{ForensicError, IngestionError, Result};
