// src/core/analysis/phase.rs
//
// Phase analysis for detecting phase-encoded payloads.
// Unwraps STFT phase along time and measures how regular the frame-to-frame drift is.

use num_complex::Complex64;

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::hilbert::unwrap_phase;
use crate::core::dsp::stats::{histogram_entropy, mean, variance};
use crate::core::dsp::{summarise, StftProcessor};
use crate::detection::DetectorResult;
use crate::error::Result;

pub const PHASE_KEYS: &[&str] = &[
    "phase_diff_variance",
    "phase_diff_mad",
    "phase_coherence",
    "phase_entropy",
    "phase_diff_mean",
    "phase_diff_std",
    "phase_diff_p75",
];

const ENTROPY_BINS: usize = 64;

/// Phase analysis results
#[derive(Debug, Clone, Default)]
pub struct PhaseAnalysis {
    pub diff_variance: f64,
    /// Mean absolute deviation of the differences around their mean
    pub diff_mad: f64,
    /// |mean(e^{i·Δφ})|: 1.0 for perfectly regular drift, ~0 for random phase
    pub coherence: f64,
    pub entropy: f64,
    pub diff_mean: f64,
    pub diff_std: f64,
    pub diff_p75: f64,
    pub difference_count: usize,
}

impl PhaseAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("phase_diff_variance", self.diff_variance),
            ("phase_diff_mad", self.diff_mad),
            ("phase_coherence", self.coherence),
            ("phase_entropy", self.entropy),
            ("phase_diff_mean", self.diff_mean),
            ("phase_diff_std", self.diff_std),
            ("phase_diff_p75", self.diff_p75),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct PhaseDetector {
    pub n_fft: usize,
    pub hop_length: usize,
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
        }
    }
}

impl PhaseDetector {
    pub fn analyze(&self, samples: &[f64], cancel: &CancelToken) -> Result<PhaseAnalysis> {
        let stft = StftProcessor::for_signal(samples, self.n_fft, self.hop_length);
        let frames = stft.complex_frames(samples, cancel)?;
        let differences = unwrapped_differences(&frames);

        let stats = summarise(differences.iter().copied());
        if differences.is_empty() {
            return Ok(PhaseAnalysis {
                diff_mean: stats.mean,
                diff_std: stats.std,
                diff_p75: stats.percentile_75,
                ..PhaseAnalysis::default()
            });
        }

        let centre = mean(&differences);
        let diff_mad =
            differences.iter().map(|d| (d - centre).abs()).sum::<f64>() / differences.len() as f64;
        let phasor: Complex64 = differences
            .iter()
            .map(|&d| Complex64::from_polar(1.0, d))
            .sum::<Complex64>()
            / differences.len() as f64;

        Ok(PhaseAnalysis {
            diff_variance: variance(&differences),
            diff_mad,
            coherence: phasor.norm(),
            entropy: histogram_entropy(&differences, ENTROPY_BINS),
            diff_mean: stats.mean,
            diff_std: stats.std,
            diff_p75: stats.percentile_75,
            difference_count: differences.len(),
        })
    }
}

/// Per-bin phase, unwrapped along time, differenced between consecutive frames.
/// Flattened bin-major; empty when there are fewer than two frames.
fn unwrapped_differences(frames: &[Vec<Complex64>]) -> Vec<f64> {
    if frames.len() < 2 {
        return Vec::new();
    }
    let bins = frames[0].len();
    let mut differences = Vec::with_capacity(bins * (frames.len() - 1));
    let mut track = vec![0.0; frames.len()];

    for bin in 0..bins {
        for (slot, frame) in track.iter_mut().zip(frames) {
            *slot = frame[bin].arg();
        }
        unwrap_phase(&mut track);
        differences.extend(track.windows(2).map(|w| w[1] - w[0]));
    }
    differences
}

impl Detector for PhaseDetector {
    fn stage(&self) -> Stage {
        Stage::Phase
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        PHASE_KEYS
    }

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult> {
        Ok(self.analyze(input.mono, cancel)?.to_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    #[test]
    fn test_silence_has_perfect_coherence() {
        let analysis = PhaseDetector::default()
            .analyze(&vec![0.0; 8192], &CancelToken::new())
            .unwrap();
        assert_eq!(analysis.diff_variance, 0.0);
        assert!((analysis.coherence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_has_low_coherence() {
        let mut rng = Pcg64::seed_from_u64(7);
        let noise: Vec<f64> = (0..16384).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let analysis = PhaseDetector::default()
            .analyze(&noise, &CancelToken::new())
            .unwrap();
        assert!(analysis.coherence < 0.1, "coherence {}", analysis.coherence);
        assert!(analysis.diff_variance > 0.5);
        assert!(analysis.diff_std.is_finite());
    }

    #[test]
    fn test_single_frame_sentinels() {
        let analysis = PhaseDetector::default()
            .analyze(&[0.5, -0.5, 0.25], &CancelToken::new())
            .unwrap();
        assert_eq!(analysis.difference_count, 0);
        assert_eq!(analysis.coherence, 0.0);
        assert_eq!(analysis.entropy, 0.0);
        assert!(analysis.diff_mean.is_nan());
        assert!(analysis.diff_p75.is_nan());

        let result = analysis.to_result();
        assert_eq!(result.len(), PHASE_KEYS.len());
        assert!(PHASE_KEYS.iter().all(|k| result.contains_key(k)));
    }
}
