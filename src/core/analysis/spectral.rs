// src/core/analysis/spectral.rs
//
// Spectral decomposition engine: short-time spectrum, mel energy, cepstral
// coefficients, chroma and per-frame spectral shape curves.

use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, info};

use crate::config::SpectralConfig;
use crate::core::cancel::CancelToken;
use crate::core::dsp::chroma::{ChromaFilterbank, N_CHROMA};
use crate::core::dsp::mel::{dct_ortho, power_to_db, MelFilterbank};
use crate::core::dsp::wavelet::haar_decompose;
use crate::core::dsp::{summarise, FrameLayout, StftProcessor, SummaryStatistics};
use crate::detection::ResultValue;
use crate::error::{ForensicError, Result};

/// Lower edge of the first octave band used by spectral contrast
const CONTRAST_FMIN_HZ: f64 = 200.0;
const CONTRAST_BANDS: usize = 6;
const CONTRAST_QUANTILE: f64 = 0.02;
const TOP_DB: f64 = 80.0;

/// Dense row-major matrix: one row per feature dimension, one column per frame
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from frame-major columns (`cols x rows`)
    pub fn from_columns(columns: &[Vec<f64>], rows: usize) -> Self {
        let mut matrix = Self::zeros(rows, columns.len());
        for (c, column) in columns.iter().enumerate() {
            for (r, &value) in column.iter().enumerate().take(rows) {
                matrix.set(r, c, value);
            }
        }
        matrix
    }

    pub fn from_row(row: Vec<f64>) -> Self {
        Self {
            rows: 1,
            cols: row.len(),
            data: row,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// All values, row-major
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn to_result_value(&self) -> ResultValue {
        ResultValue::List(
            (0..self.rows)
                .map(|r| ResultValue::from(self.row(r).to_vec()))
                .collect(),
        )
    }
}

/// Output of [`SpectralEngine::compute`]
#[derive(Debug, Clone)]
pub struct SpectralFeatures {
    pub layout: FrameLayout,
    pub matrices: BTreeMap<String, FeatureMatrix>,
    pub summaries: BTreeMap<String, SummaryStatistics>,
}

impl SpectralFeatures {
    /// `({matrix}_{stat}, value)` pairs in a stable order (matrix name, then summary field)
    pub fn flatten_summaries(&self) -> Vec<(String, f64)> {
        self.summaries
            .iter()
            .flat_map(|(name, stats)| {
                stats
                    .fields()
                    .into_iter()
                    .map(move |(field, value)| (format!("{}_{}", name, field), value))
            })
            .collect()
    }

    /// Values of [`flatten_summaries`](Self::flatten_summaries) as one observation row
    pub fn feature_vector(&self) -> Vec<f64> {
        self.flatten_summaries().into_iter().map(|(_, v)| v).collect()
    }

    pub fn to_result_value(&self, include_matrices: bool) -> ResultValue {
        let mut node = ResultValue::map();
        let summaries = ResultValue::Map(
            self.summaries
                .iter()
                .map(|(name, stats)| (name.clone(), ResultValue::from(*stats)))
                .collect(),
        );
        node.insert("summaries", summaries);
        if include_matrices {
            let matrices = ResultValue::Map(
                self.matrices
                    .iter()
                    .map(|(name, m)| (name.clone(), m.to_result_value()))
                    .collect(),
            );
            node.insert("matrices", matrices);
        }
        node
    }
}

/// Spectral feature extractor over a mono signal
#[derive(Debug, Clone, Default)]
pub struct SpectralEngine {
    config: SpectralConfig,
}

impl SpectralEngine {
    pub fn new(config: SpectralConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Decompose `samples` into the spectral matrices and their summaries
    pub fn compute(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<SpectralFeatures> {
        if samples.is_empty() {
            return Err(ForensicError::computation(
                "spectral engine received an empty sample buffer",
            ));
        }
        if sample_rate == 0 {
            return Err(ForensicError::computation("sample rate must be positive"));
        }

        let start = Instant::now();
        let stft = StftProcessor::for_signal(samples, self.config.n_fft, self.config.hop_length);
        let layout = *stft.layout();
        let magnitudes = stft.magnitude_frames(samples, cancel)?;
        let freqs = layout.bin_frequencies(sample_rate);
        let bins = layout.bins();

        let power: Vec<Vec<f64>> = magnitudes
            .iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect();

        let mut matrices = BTreeMap::new();
        matrices.insert(
            "stft".to_string(),
            FeatureMatrix::from_columns(&magnitudes, bins),
        );

        // Mel energy and cepstral coefficients from its dB scale
        let mel_bank = MelFilterbank::new(sample_rate, layout.window, self.config.n_mels.max(1));
        let n_mels = mel_bank.n_mels();
        let mel_columns: Vec<Vec<f64>> = power.iter().map(|p| mel_bank.apply(p)).collect();
        let mel = FeatureMatrix::from_columns(&mel_columns, n_mels);

        let mut mel_db: Vec<f64> = mel_columns.iter().flatten().copied().collect();
        power_to_db(&mut mel_db, TOP_DB);
        let n_mfcc = self.config.n_mfcc.min(n_mels);
        let mfcc_columns: Vec<Vec<f64>> = mel_db
            .chunks(n_mels)
            .map(|column| dct_ortho(column, n_mfcc))
            .collect();
        matrices.insert("mel".to_string(), mel);
        matrices.insert(
            "mfcc".to_string(),
            FeatureMatrix::from_columns(&mfcc_columns, n_mfcc),
        );
        cancel.check()?;

        let chroma_bank = ChromaFilterbank::new(sample_rate, layout.window);
        let chroma_columns: Vec<Vec<f64>> = power
            .iter()
            .map(|p| chroma_bank.apply(p).to_vec())
            .collect();
        matrices.insert(
            "chroma".to_string(),
            FeatureMatrix::from_columns(&chroma_columns, N_CHROMA),
        );

        let centroid: Vec<f64> = magnitudes.iter().map(|m| spectral_centroid(m, &freqs)).collect();
        let bandwidth: Vec<f64> = magnitudes
            .iter()
            .zip(&centroid)
            .map(|(m, &c)| spectral_bandwidth(m, &freqs, c))
            .collect();
        let rolloff: Vec<f64> = magnitudes
            .iter()
            .map(|m| spectral_rolloff(m, &freqs, self.config.rolloff_percent))
            .collect();
        let bands = contrast_bands(&freqs);
        let contrast_columns: Vec<Vec<f64>> = magnitudes
            .iter()
            .map(|m| spectral_contrast(m, &bands))
            .collect();

        matrices.insert(
            "spectral_centroid".to_string(),
            FeatureMatrix::from_row(centroid),
        );
        matrices.insert(
            "spectral_bandwidth".to_string(),
            FeatureMatrix::from_row(bandwidth),
        );
        matrices.insert(
            "spectral_contrast".to_string(),
            FeatureMatrix::from_columns(&contrast_columns, bands.len()),
        );
        matrices.insert(
            "spectral_rolloff".to_string(),
            FeatureMatrix::from_row(rolloff),
        );

        if self.config.wavelet.enabled {
            let decomposition = haar_decompose(samples, self.config.wavelet.levels, cancel)?;
            matrices.insert(
                "wavelet_approx".to_string(),
                FeatureMatrix::from_row(decomposition.approximation),
            );
            for (level, detail) in decomposition.details.into_iter().enumerate() {
                matrices.insert(
                    format!("wavelet_detail_{}", level + 1),
                    FeatureMatrix::from_row(detail),
                );
            }
        }

        let summaries = matrices
            .iter()
            .map(|(name, m)| (name.clone(), summarise(m.values().iter().copied())))
            .collect();

        debug!(
            "Spectral matrices: {} ({} frames x {} bins)",
            matrices.len(),
            layout.frames,
            bins
        );
        info!("Spectral stage finished in {:.2?}", start.elapsed());

        Ok(SpectralFeatures {
            layout,
            matrices,
            summaries,
        })
    }
}

/// Magnitude-weighted mean frequency of one frame (0 for a silent frame)
pub(crate) fn spectral_centroid(magnitudes: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    magnitudes.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

fn spectral_bandwidth(magnitudes: &[f64], freqs: &[f64], centroid: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let spread: f64 = magnitudes
        .iter()
        .zip(freqs)
        .map(|(m, f)| m * (f - centroid) * (f - centroid))
        .sum();
    (spread / total).sqrt()
}

/// Lowest frequency below which `percent` of the frame's magnitude lies
fn spectral_rolloff(magnitudes: &[f64], freqs: &[f64], percent: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = percent * total;
    let mut cumulative = 0.0;
    for (m, &f) in magnitudes.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            return f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Bin ranges of the octave bands: `[0, fmin]`, then one octave each, the last running to Nyquist.
/// Each band after the first borrows one bin below its lower edge; all but the last drop their top bin.
fn contrast_bands(freqs: &[f64]) -> Vec<std::ops::Range<usize>> {
    let mut edges = vec![0.0];
    edges.extend((0..=CONTRAST_BANDS).map(|k| CONTRAST_FMIN_HZ * 2f64.powi(k as i32)));

    (0..=CONTRAST_BANDS)
        .map(|k| {
            let (lo, hi) = (edges[k], edges[k + 1]);
            let mut inside = freqs
                .iter()
                .enumerate()
                .filter(|&(_, &f)| f >= lo && f <= hi)
                .map(|(i, _)| i);
            let Some(first) = inside.next() else {
                return 0..0;
            };
            let last = inside.last().unwrap_or(first);

            let start = if k > 0 { first.saturating_sub(1) } else { first };
            let end = if k == CONTRAST_BANDS {
                freqs.len()
            } else {
                last
            };
            start..end.max(start)
        })
        .collect()
}

/// Peak-to-valley ratio in dB of every band, using the top and bottom 2% of each band
fn spectral_contrast(magnitudes: &[f64], bands: &[std::ops::Range<usize>]) -> Vec<f64> {
    bands
        .iter()
        .map(|band| {
            if band.is_empty() {
                return 0.0;
            }
            let mut values: Vec<f64> = magnitudes[band.clone()].to_vec();
            values.sort_by(|a, b| a.total_cmp(b));
            let count = ((CONTRAST_QUANTILE * values.len() as f64).round() as usize).max(1);
            let valley = values[..count].iter().sum::<f64>() / count as f64;
            let peak = values[values.len() - count..].iter().sum::<f64>() / count as f64;
            10.0 * peak.max(1e-10).log10() - 10.0 * valley.max(1e-10).log10()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sr: u32, secs: f64) -> Vec<f64> {
        let n = (sr as f64 * secs) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect()
    }

    const MATRICES: [&str; 8] = [
        "chroma",
        "mel",
        "mfcc",
        "spectral_bandwidth",
        "spectral_centroid",
        "spectral_contrast",
        "spectral_rolloff",
        "stft",
    ];

    #[test]
    fn test_eight_matrices_with_summaries() {
        let samples = sine(440.0, 22050, 1.0);
        let features = SpectralEngine::default()
            .compute(&samples, 22050, &CancelToken::new())
            .unwrap();

        let names: Vec<&str> = features.matrices.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, MATRICES);
        assert_eq!(features.summaries.len(), 8);

        let frames = (22050 - 2048) / 512 + 1;
        assert_eq!(features.layout.frames, frames);
        assert_eq!(features.matrices["stft"].rows(), 1025);
        assert_eq!(features.matrices["mel"].rows(), 128);
        assert_eq!(features.matrices["mfcc"].rows(), 20);
        assert_eq!(features.matrices["chroma"].rows(), 12);
        assert_eq!(features.matrices["spectral_contrast"].rows(), 7);
        for m in features.matrices.values() {
            assert_eq!(m.cols(), frames);
        }
    }

    #[test]
    fn test_centroid_tracks_tone() {
        let samples = sine(1000.0, 22050, 0.5);
        let features = SpectralEngine::default()
            .compute(&samples, 22050, &CancelToken::new())
            .unwrap();
        let centroid = features.summaries["spectral_centroid"].median;
        assert!((centroid - 1000.0).abs() < 100.0, "centroid {}", centroid);

        // A 1 kHz tone is pitch class B (11)
        let chroma = &features.matrices["chroma"];
        assert_eq!(chroma.get(11, 0), 1.0);
    }

    #[test]
    fn test_tiny_signal_is_clamped_not_rejected() {
        let features = SpectralEngine::default()
            .compute(&[0.1, -0.2, 0.3], 22050, &CancelToken::new())
            .unwrap();
        assert_eq!(features.layout.window, 3);
        assert_eq!(features.layout.frames, 1);
        assert_eq!(features.matrices.len(), 8);
    }

    #[test]
    fn test_one_and_two_samples_use_window_floor() {
        for samples in [vec![0.5], vec![0.5, -0.5]] {
            let features = SpectralEngine::default()
                .compute(&samples, 22050, &CancelToken::new())
                .unwrap();
            assert_eq!(features.layout.window, 2);
            assert_eq!(features.layout.hop, 1);
            assert_eq!(features.layout.frames, 1);
            assert_eq!(features.matrices["stft"].rows(), 2);
            assert_eq!(features.matrices["stft"].cols(), 1);
            assert_eq!(features.matrices.len(), 8);
        }
    }

    #[test]
    fn test_empty_signal_is_error() {
        let err = SpectralEngine::default()
            .compute(&[], 22050, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ForensicError::Computation(_)));
    }

    #[test]
    fn test_wavelet_keys_only_when_enabled() {
        let samples = sine(440.0, 8000, 0.25);
        let mut config = SpectralConfig::default();
        config.wavelet.enabled = true;
        config.wavelet.levels = 3;
        let features = SpectralEngine::new(config)
            .compute(&samples, 8000, &CancelToken::new())
            .unwrap();
        assert!(features.matrices.contains_key("wavelet_approx"));
        assert!(features.matrices.contains_key("wavelet_detail_3"));
        assert_eq!(features.matrices.len(), 12);

        let plain = SpectralEngine::default()
            .compute(&samples, 8000, &CancelToken::new())
            .unwrap();
        assert!(!plain.matrices.keys().any(|k| k.starts_with("wavelet")));
    }

    #[test]
    fn test_flattened_order_is_stable() {
        let samples = sine(220.0, 8000, 0.5);
        let features = SpectralEngine::default()
            .compute(&samples, 8000, &CancelToken::new())
            .unwrap();
        let flat = features.flatten_summaries();
        assert_eq!(flat.len(), 8 * 7);
        assert_eq!(flat[0].0, "chroma_mean");
        assert_eq!(flat[6].0, "chroma_percentile_75");
        assert_eq!(flat.last().map(|(k, _)| k.as_str()), Some("stft_percentile_75"));
    }

    #[test]
    fn test_rolloff_and_contrast_helpers() {
        let freqs = [0.0, 100.0, 200.0, 300.0];
        assert_eq!(spectral_rolloff(&[0.0, 1.0, 0.0, 0.0], &freqs, 0.85), 100.0);
        assert_eq!(spectral_rolloff(&[0.0; 4], &freqs, 0.85), 0.0);
        let flat = spectral_contrast(&[1.0; 8], &[0..8]);
        assert!(flat[0].abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_compute() {
        let token = CancelToken::new();
        token.cancel();
        let err = SpectralEngine::default()
            .compute(&sine(440.0, 8000, 1.0), 8000, &token)
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
