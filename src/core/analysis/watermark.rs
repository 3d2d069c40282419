// src/core/analysis/watermark.rs
//
// Watermark heuristics: spectral flatness and tonal-centroid variability per frame.

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::chroma::{tonnetz, ChromaFilterbank};
use crate::core::dsp::stats::spectral_flatness;
use crate::core::dsp::{summarise, StftProcessor};
use crate::detection::DetectorResult;
use crate::error::Result;

pub const WATERMARK_KEYS: &[&str] = &[
    "flatness_mean",
    "flatness_std",
    "tonal_centroid_mean",
    "tonal_centroid_std",
    "watermark_score",
];

/// Tonal-centroid spread tolerated before it adds to the score
const TONAL_STD_ALLOWANCE: f64 = 0.1;

/// Watermark analysis results
#[derive(Debug, Clone, Default)]
pub struct WatermarkAnalysis {
    pub flatness_mean: f64,
    pub flatness_std: f64,
    pub tonal_centroid_mean: f64,
    pub tonal_centroid_std: f64,
    pub score: f64,
}

impl WatermarkAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("flatness_mean", self.flatness_mean),
            ("flatness_std", self.flatness_std),
            ("tonal_centroid_mean", self.tonal_centroid_mean),
            ("tonal_centroid_std", self.tonal_centroid_std),
            ("watermark_score", self.score),
        ])
    }
}

/// `1 - min(flatness_mean, 1) + max(0, tonal_std - 0.1)`
pub fn watermark_score(flatness_mean: f64, tonal_std: f64) -> f64 {
    1.0 - flatness_mean.min(1.0) + (tonal_std - TONAL_STD_ALLOWANCE).max(0.0)
}

#[derive(Debug, Clone)]
pub struct WatermarkDetector {
    pub n_fft: usize,
    pub hop_length: usize,
}

impl Default for WatermarkDetector {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
        }
    }
}

impl WatermarkDetector {
    pub fn analyze(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<WatermarkAnalysis> {
        let stft = StftProcessor::for_signal(samples, self.n_fft, self.hop_length);
        let magnitudes = stft.magnitude_frames(samples, cancel)?;
        let chroma_bank = ChromaFilterbank::new(sample_rate, stft.layout().window);

        let mut flatness = Vec::with_capacity(magnitudes.len());
        let mut centroid = Vec::with_capacity(magnitudes.len() * 6);
        for frame in &magnitudes {
            flatness.push(spectral_flatness(frame));
            let power: Vec<f64> = frame.iter().map(|m| m * m).collect();
            centroid.extend(tonnetz(&chroma_bank.apply(&power)));
        }

        let flat = summarise(flatness);
        let tonal = summarise(centroid);
        Ok(WatermarkAnalysis {
            flatness_mean: flat.mean,
            flatness_std: flat.std,
            tonal_centroid_mean: tonal.mean,
            tonal_centroid_std: tonal.std,
            score: watermark_score(flat.mean, tonal.std),
        })
    }
}

impl Detector for WatermarkDetector {
    fn stage(&self) -> Stage {
        Stage::Watermark
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        WATERMARK_KEYS
    }

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult> {
        Ok(self
            .analyze(input.mono, input.sample_rate(), cancel)?
            .to_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;
    use std::f64::consts::PI;

    #[test]
    fn test_score_formula() {
        assert_eq!(watermark_score(1.0, 0.0), 0.0);
        assert_eq!(watermark_score(2.0, 0.05), 0.0);
        assert!((watermark_score(0.25, 0.3) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_tone_scores_above_noise() {
        let sr = 22050;
        let tone: Vec<f64> = (0..sr)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f64 / sr as f64).sin())
            .collect();
        let mut rng = Pcg64::seed_from_u64(11);
        let noise: Vec<f64> = (0..sr).map(|_| rng.gen_range(-0.5..0.5)).collect();

        let detector = WatermarkDetector::default();
        let tonal = detector.analyze(&tone, sr as u32, &CancelToken::new()).unwrap();
        let noisy = detector.analyze(&noise, sr as u32, &CancelToken::new()).unwrap();

        assert!(tonal.flatness_mean < noisy.flatness_mean);
        assert!(tonal.score > noisy.score);
        assert!(tonal.tonal_centroid_std.is_finite());
    }
}
