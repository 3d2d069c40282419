// src/core/analysis/backmask.rs
//
// Backmask detection: similarity between the signal and its time reversal.

use num_complex::Complex64;
use rustfft::FftPlanner;

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::stats::pearson;
use crate::core::dsp::summarise;
use crate::detection::DetectorResult;
use crate::error::Result;

pub const BACKMASK_KEYS: &[&str] = &[
    "backmask_peak_correlation",
    "frame_correlation_mean",
    "frame_correlation_std",
    "energy_symmetry",
];

/// Backmask analysis results
#[derive(Debug, Clone, Default)]
pub struct BackmaskAnalysis {
    /// Peak of the forward/reversed cross-correlation, normalized by both norms
    pub peak_correlation: f64,
    pub frame_correlation_mean: f64,
    pub frame_correlation_std: f64,
    /// Mean |E_forward - E_reversed| per frame, divided by the frame length
    pub energy_symmetry: f64,
    pub frame_length: usize,
    pub frame_count: usize,
}

impl BackmaskAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("backmask_peak_correlation", self.peak_correlation),
            ("frame_correlation_mean", self.frame_correlation_mean),
            ("frame_correlation_std", self.frame_correlation_std),
            ("energy_symmetry", self.energy_symmetry),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct BackmaskDetector {
    /// Frame duration for the segment-wise comparison
    pub frame_seconds: f64,
}

impl Default for BackmaskDetector {
    fn default() -> Self {
        Self { frame_seconds: 5.0 }
    }
}

impl BackmaskDetector {
    pub fn analyze(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<BackmaskAnalysis> {
        let n = samples.len();
        let reversed: Vec<f64> = samples.iter().rev().copied().collect();
        let peak_correlation = normalized_peak_correlation(samples, &reversed);
        cancel.check()?;

        let frame_length = ((self.frame_seconds * sample_rate as f64) as usize)
            .min(n)
            .max(1);
        let frame_count = n / frame_length;

        let mut correlations = Vec::with_capacity(frame_count);
        let mut energy_gaps = Vec::with_capacity(frame_count);
        for (forward, backward) in samples
            .chunks_exact(frame_length)
            .zip(reversed.chunks_exact(frame_length))
        {
            let r = pearson(forward, backward);
            correlations.push(if r.is_nan() { 0.0 } else { r });

            let e_forward: f64 = forward.iter().map(|s| s * s).sum();
            let e_backward: f64 = backward.iter().map(|s| s * s).sum();
            energy_gaps.push((e_forward - e_backward).abs() / frame_length as f64);
        }

        let stats = summarise(correlations.iter().copied());
        let energy_symmetry = if energy_gaps.is_empty() {
            0.0
        } else {
            energy_gaps.iter().sum::<f64>() / energy_gaps.len() as f64
        };

        Ok(BackmaskAnalysis {
            peak_correlation,
            frame_correlation_mean: stats.mean,
            frame_correlation_std: stats.std,
            energy_symmetry,
            frame_length,
            frame_count,
        })
    }
}

/// max |x ⋆ y| / (‖x‖·‖y‖) over all lags, via zero-padded FFT; 0 when either norm is 0
fn normalized_peak_correlation(x: &[f64], y: &[f64]) -> f64 {
    let norm_x = x.iter().map(|s| s * s).sum::<f64>().sqrt();
    let norm_y = y.iter().map(|s| s * s).sum::<f64>().sqrt();
    if norm_x == 0.0 || norm_y == 0.0 {
        return 0.0;
    }

    let size = x.len() + y.len() - 1;
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let padded = |signal: &[f64]| -> Vec<Complex64> {
        let mut buffer = vec![Complex64::new(0.0, 0.0); size];
        for (slot, &s) in buffer.iter_mut().zip(signal) {
            slot.re = s;
        }
        buffer
    };
    let mut fx = padded(x);
    let mut fy = padded(y);
    forward.process(&mut fx);
    forward.process(&mut fy);

    for (a, b) in fx.iter_mut().zip(&fy) {
        *a *= b.conj();
    }
    inverse.process(&mut fx);

    let peak = fx
        .iter()
        .map(|c| c.re.abs() / size as f64)
        .fold(0.0f64, f64::max);
    peak / (norm_x * norm_y)
}

impl Detector for BackmaskDetector {
    fn stage(&self) -> Stage {
        Stage::Backmask
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        BACKMASK_KEYS
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
    use std::f64::consts::PI;

    #[test]
    fn test_palindrome_scores_one() {
        let half: Vec<f64> = (0..4000).map(|i| (i as f64 * 0.013).sin() * 0.7).collect();
        let mut signal = half.clone();
        signal.extend(half.iter().rev());

        let analysis = BackmaskDetector::default()
            .analyze(&signal, 8000, &CancelToken::new())
            .unwrap();
        assert!((analysis.peak_correlation - 1.0).abs() < 1e-9);
        assert_eq!(analysis.frame_count, 1);
        assert!((analysis.frame_correlation_mean - 1.0).abs() < 1e-9);
        assert!(analysis.energy_symmetry.abs() < 1e-12);
    }

    #[test]
    fn test_silence_is_zero() {
        let analysis = BackmaskDetector::default()
            .analyze(&vec![0.0; 1000], 8000, &CancelToken::new())
            .unwrap();
        assert_eq!(analysis.peak_correlation, 0.0);
        assert_eq!(analysis.frame_correlation_mean, 0.0);
        assert_eq!(analysis.energy_symmetry, 0.0);
    }

    #[test]
    fn test_frames_are_five_seconds() {
        let sr = 1000;
        let signal: Vec<f64> = (0..12_500)
            .map(|i| (2.0 * PI * 3.0 * i as f64 / sr as f64).sin())
            .collect();
        let analysis = BackmaskDetector::default()
            .analyze(&signal, sr, &CancelToken::new())
            .unwrap();
        assert_eq!(analysis.frame_length, 5000);
        assert_eq!(analysis.frame_count, 2);
        assert!(analysis.peak_correlation > 0.0 && analysis.peak_correlation <= 1.0 + 1e-9);
    }

    #[test]
    fn test_peak_correlation_bounds() {
        let x = [1.0, 2.0, 3.0];
        let peak = normalized_peak_correlation(&x, &x);
        assert!((peak - 1.0).abs() < 1e-12);
        assert_eq!(normalized_peak_correlation(&x, &[0.0, 0.0, 0.0]), 0.0);
    }
}
