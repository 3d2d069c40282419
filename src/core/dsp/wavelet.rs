//! Multi-level Haar wavelet decomposition

use std::f64::consts::FRAC_1_SQRT_2;

use crate::core::cancel::CancelToken;
use crate::error::Result;

/// Coefficients of a multi-level decomposition
#[derive(Debug, Clone, Default)]
pub struct WaveletDecomposition {
    /// Final approximation band
    pub approximation: Vec<f64>,
    /// Detail bands, finest (level 1) first
    pub details: Vec<Vec<f64>>,
}

/// Decompose `samples` over at most `levels` Haar steps.
/// Odd-length bands repeat their last sample; decomposition stops once a band has fewer than 2 samples.
pub fn haar_decompose(
    samples: &[f64],
    levels: usize,
    cancel: &CancelToken,
) -> Result<WaveletDecomposition> {
    let mut approximation = samples.to_vec();
    let mut details = Vec::with_capacity(levels);

    for _ in 0..levels {
        cancel.check()?;
        if approximation.len() < 2 {
            break;
        }
        let (next, detail) = haar_step(&approximation);
        details.push(detail);
        approximation = next;
    }

    Ok(WaveletDecomposition {
        approximation,
        details,
    })
}

fn haar_step(band: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let pairs = band.len().div_ceil(2);
    let mut approx = Vec::with_capacity(pairs);
    let mut detail = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let a = band[2 * i];
        let b = band.get(2 * i + 1).copied().unwrap_or(a);
        approx.push((a + b) * FRAC_1_SQRT_2);
        detail.push((a - b) * FRAC_1_SQRT_2);
    }
    (approx, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_signal_has_no_detail() {
        let decomposition = haar_decompose(&[1.0; 16], 3, &CancelToken::new()).unwrap();
        assert_eq!(decomposition.details.len(), 3);
        assert_eq!(decomposition.approximation.len(), 2);
        assert!(decomposition
            .details
            .iter()
            .flatten()
            .all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn test_energy_preserved_single_level() {
        let signal = [1.0, -2.0, 3.0, 0.5];
        let d = haar_decompose(&signal, 1, &CancelToken::new()).unwrap();
        let before: f64 = signal.iter().map(|s| s * s).sum();
        let after: f64 = d
            .approximation
            .iter()
            .chain(d.details[0].iter())
            .map(|s| s * s)
            .sum();
        assert!((before - after).abs() < 1e-12);
    }

    #[test]
    fn test_stops_on_short_band() {
        let d = haar_decompose(&[1.0, 2.0, 3.0], 10, &CancelToken::new()).unwrap();
        assert_eq!(d.details.len(), 2);
        assert_eq!(d.approximation.len(), 1);
    }
}
