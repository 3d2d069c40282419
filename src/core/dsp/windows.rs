//! Window function implementations

use std::f64::consts::PI;

/// Periodic (DFT-even) Hann window, the convention used for STFT analysis
pub fn hann_window(size: usize) -> Vec<f64> {
    let n = size as f64;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(4);
        assert!((window[0]).abs() < 1e-12);
        assert!((window[1] - 0.5).abs() < 1e-12);
        assert!((window[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hann_is_periodic() {
        // Last sample is not repeated as zero
        let window = hann_window(8);
        assert!(window[7] > 0.1);
        assert!((window[1] - window[7]).abs() < 1e-12);
    }
}
