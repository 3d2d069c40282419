//! Mel filterbank, decibel conversion and the DCT used for cepstral coefficients

use std::f64::consts::PI;

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney-style mel scale: linear below 1 kHz, logarithmic above
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        mel * MEL_F_SP
    }
}

/// Triangular, area-normalized mel filters over the bins of one FFT frame
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// `n_mels x bins`
    weights: Vec<Vec<f64>>,
}

impl MelFilterbank {
    /// Filters spanning 0 Hz to Nyquist
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let fmax = sample_rate as f64 / 2.0;
        let fft_freqs: Vec<f64> = (0..bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mel_max = hz_to_mel(fmax);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (left, centre, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let norm = 2.0 / (right - left);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - left) / (centre - left);
                        let upper = (right - f) / (right - centre);
                        lower.min(upper).max(0.0) * norm
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Project one power-spectrum frame onto the mel bands
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|w| w.iter().zip(power).map(|(a, b)| a * b).sum())
            .collect()
    }
}

/// Convert power values to dB (ref 1.0, floor 1e-10), clipped to `top_db` below the peak
pub fn power_to_db(values: &mut [f64], top_db: f64) {
    let mut peak = f64::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(1e-10).log10();
        peak = peak.max(*v);
    }
    let floor = peak - top_db;
    for v in values.iter_mut() {
        *v = v.max(floor);
    }
}

/// Orthonormal DCT-II, keeping the first `n_out` coefficients
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let nf = n as f64;
    (0..n_out.min(n))
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / nf).sqrt()
            } else {
                (2.0 / nf).sqrt()
            };
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * nf)).cos())
                .sum();
            scale * sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_round_trip() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_filterbank_shape() {
        let fb = MelFilterbank::new(22050, 2048, 128);
        assert_eq!(fb.n_mels(), 128);
        let out = fb.apply(&vec![1.0; 1025]);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_power_to_db_top_db() {
        let mut values = vec![1.0, 1e-12, 0.1];
        power_to_db(&mut values, 80.0);
        assert!((values[0] - 0.0).abs() < 1e-12);
        assert!((values[1] + 80.0).abs() < 1e-12);
        assert!((values[2] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_dct_of_constant() {
        let coeffs = dct_ortho(&[1.0; 8], 4);
        assert!((coeffs[0] - 8f64.sqrt()).abs() < 1e-12);
        assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-12));
    }
}
