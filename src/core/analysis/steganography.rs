// src/core/analysis/steganography.rs
//
// LSB steganography detection on the 16-bit integer representation.
// Embedded payloads push the least significant bit plane toward a uniform,
// uncorrelated, high-transition sequence.

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::stats::{mean, pearson, population_std, variance};
use crate::detection::DetectorResult;
use crate::error::Result;

pub const STEGANOGRAPHY_KEYS: &[&str] = &[
    "lsb_chi_square",
    "lsb_transition_rate",
    "lsb_bitplane_correlation",
    "lsb_window_mean_std",
    "lsb_variance",
];

/// Samples per window for the windowed LSB mean
pub const LSB_WINDOW: usize = 2048;

const I16_SCALE: f64 = 32767.0;

/// Steganography analysis results
#[derive(Debug, Clone, Default)]
pub struct SteganographyAnalysis {
    pub chi_square: f64,
    pub transition_rate: f64,
    pub bitplane_correlation: f64,
    pub window_mean_std: f64,
    pub lsb_variance: f64,
    pub sample_count: usize,
}

impl SteganographyAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("lsb_chi_square", self.chi_square),
            ("lsb_transition_rate", self.transition_rate),
            ("lsb_bitplane_correlation", self.bitplane_correlation),
            ("lsb_window_mean_std", self.window_mean_std),
            ("lsb_variance", self.lsb_variance),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct SteganographyDetector;

impl SteganographyDetector {
    /// Analyze an arbitrary sample stream (channel-major for multichannel audio)
    pub fn analyze<I>(&self, samples: I) -> SteganographyAnalysis
    where
        I: IntoIterator<Item = f64>,
    {
        let (lsb, second) = quantize_bitplanes(samples);
        let lsb_values: Vec<f64> = lsb.iter().map(|&b| b as f64).collect();

        SteganographyAnalysis {
            chi_square: chi_square_uniform(&lsb),
            transition_rate: transition_rate(&lsb),
            bitplane_correlation: bitplane_correlation(&lsb, &second),
            window_mean_std: window_mean_std(&lsb, LSB_WINDOW),
            lsb_variance: if lsb_values.is_empty() {
                0.0
            } else {
                variance(&lsb_values)
            },
            sample_count: lsb.len(),
        }
    }
}

/// Scale to signed 16-bit (truncating, saturating) and split off bit 0 and bit 1
pub fn quantize_bitplanes<I>(samples: I) -> (Vec<u8>, Vec<u8>)
where
    I: IntoIterator<Item = f64>,
{
    samples
        .into_iter()
        .map(|s| {
            let q = (s * I16_SCALE).trunc().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            ((q & 1) as u8, ((q >> 1) & 1) as u8)
        })
        .unzip()
}

/// Chi-square of the bit counts against a 50/50 expectation (0 for an empty plane)
pub fn chi_square_uniform(bits: &[u8]) -> f64 {
    if bits.is_empty() {
        return 0.0;
    }
    let ones = bits.iter().filter(|&&b| b == 1).count() as f64;
    let zeros = bits.len() as f64 - ones;
    let expected = bits.len() as f64 / 2.0;
    ((ones - expected).powi(2) + (zeros - expected).powi(2)) / expected
}

/// Fraction of consecutive pairs whose bits differ (0 with fewer than two bits)
pub fn transition_rate(bits: &[u8]) -> f64 {
    if bits.len() < 2 {
        return 0.0;
    }
    let transitions = bits.windows(2).filter(|w| w[0] != w[1]).count();
    transitions as f64 / (bits.len() - 1) as f64
}

/// Pearson correlation of two bit planes; undefined correlations report 0
pub fn bitplane_correlation(a: &[u8], b: &[u8]) -> f64 {
    let a: Vec<f64> = a.iter().map(|&v| v as f64).collect();
    let b: Vec<f64> = b.iter().map(|&v| v as f64).collect();
    let r = pearson(&a, &b);
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// Std of per-window bit means over non-overlapping full windows (0 without a full window)
pub fn window_mean_std(bits: &[u8], window: usize) -> f64 {
    if window == 0 || bits.len() < window {
        return 0.0;
    }
    let means: Vec<f64> = bits
        .chunks_exact(window)
        .map(|chunk| {
            let values: Vec<f64> = chunk.iter().map(|&b| b as f64).collect();
            mean(&values)
        })
        .collect();
    population_std(&means)
}

impl Detector for SteganographyDetector {
    fn stage(&self) -> Stage {
        Stage::Steganography
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        STEGANOGRAPHY_KEYS
    }

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult> {
        cancel.check()?;
        Ok(self.analyze(input.buffer.channel_major()).to_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantization_truncates_and_saturates() {
        let (lsb, second) = quantize_bitplanes([1.0, -1.0, 2.0, 3.5 / 32767.0, 0.0]);
        // 32767 -> ...111, -32767 -> ...001, 2.0 saturates to 32767, 3.5 truncates to 3
        assert_eq!(lsb, vec![1, 1, 1, 1, 0]);
        assert_eq!(second, vec![1, 0, 1, 1, 0]);
    }

    #[test]
    fn test_chi_square() {
        assert_eq!(chi_square_uniform(&[]), 0.0);
        assert_eq!(chi_square_uniform(&[0, 1, 0, 1]), 0.0);
        // 4 ones, expected 2/2 -> (2^2 + 2^2) / 2
        assert_eq!(chi_square_uniform(&[1, 1, 1, 1]), 4.0);
    }

    #[test]
    fn test_transition_rate() {
        assert_eq!(transition_rate(&[0, 1, 0, 1]), 1.0);
        assert_eq!(transition_rate(&[1, 1, 1]), 0.0);
        assert_eq!(transition_rate(&[1]), 0.0);
    }

    #[test]
    fn test_degenerate_correlation_is_zero() {
        assert_eq!(bitplane_correlation(&[1, 1, 1], &[0, 1, 0]), 0.0);
        assert_eq!(bitplane_correlation(&[], &[]), 0.0);
        assert!((bitplane_correlation(&[0, 1, 0, 1], &[0, 1, 0, 1]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_mean_std() {
        assert_eq!(window_mean_std(&[1; 100], LSB_WINDOW), 0.0);
        let mut bits = vec![0u8; 4];
        bits.extend([1u8; 4]);
        assert!((window_mean_std(&bits, 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_stream() {
        let analysis = SteganographyDetector.analyze(Vec::<f64>::new());
        let result = analysis.to_result();
        assert_eq!(result.len(), STEGANOGRAPHY_KEYS.len());
        assert!(result.iter().all(|(_, v)| v == 0.0));
    }
}
