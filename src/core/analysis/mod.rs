//! Audio analysis algorithms
//!
//! Contains the spectral decomposition engine and the forensic detectors:
//! - Phase analysis (phase-encoded payloads)
//! - Backmask analysis (reversed content)
//! - Subliminal analysis (out-of-band energy, AM/FM modulation)
//! - Steganography analysis (LSB bit-plane statistics)
//! - Watermark analysis (flatness and tonal centroid)
//! - Temporal analysis (zero crossings, tempo, beat stability)
//! - Anomaly scoring over the spectral summary

mod anomaly;
mod backmask;
mod phase;
mod spectral;
mod steganography;
mod subliminal;
mod temporal;
mod watermark;

use crate::config::Stage;
use crate::core::audio::AudioBuffer;
use crate::core::cancel::CancelToken;
use crate::detection::DetectorResult;
use crate::error::Result;

pub use anomaly::{AnomalyScorer, IsolationForestScorer, ZScoreScorer, ANOMALY_KEYS};
pub use backmask::{BackmaskAnalysis, BackmaskDetector, BACKMASK_KEYS};
pub use phase::{PhaseAnalysis, PhaseDetector, PHASE_KEYS};
pub use spectral::{FeatureMatrix, SpectralEngine, SpectralFeatures};
pub use steganography::{
    bitplane_correlation, chi_square_uniform, quantize_bitplanes, transition_rate,
    window_mean_std, SteganographyAnalysis, SteganographyDetector, STEGANOGRAPHY_KEYS,
};
pub use subliminal::{SubliminalAnalysis, SubliminalDetector, SUBLIMINAL_KEYS};
pub use temporal::{TemporalAnalysis, TemporalDetector, TEMPORAL_KEYS};
pub use watermark::{watermark_score, WatermarkAnalysis, WatermarkDetector, WATERMARK_KEYS};

/// Read-only view handed to every detector
#[derive(Debug, Clone, Copy)]
pub struct DetectorInput<'a> {
    /// Full buffer, every channel
    pub buffer: &'a AudioBuffer,
    /// Mono downmix of `buffer`
    pub mono: &'a [f64],
}

impl<'a> DetectorInput<'a> {
    pub fn new(buffer: &'a AudioBuffer, mono: &'a [f64]) -> Self {
        Self { buffer, mono }
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }
}

/// A sibling stage that reduces the buffer to a fixed set of named metrics
pub trait Detector: Send + Sync {
    fn stage(&self) -> Stage;

    /// Every key `detect` reports; also used for the failure placeholder
    fn metric_keys(&self) -> &'static [&'static str];

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult>;
}

/// The six standard detectors with default parameters, in result order
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(PhaseDetector::default()),
        Box::new(BackmaskDetector::default()),
        Box::new(SubliminalDetector::default()),
        Box::new(SteganographyDetector::default()),
        Box::new(TemporalDetector::default()),
        Box::new(WatermarkDetector::default()),
    ]
}
