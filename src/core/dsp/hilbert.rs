//! Analytic signal and phase unwrapping

use std::f64::consts::PI;

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Analytic signal via the FFT method: keep DC (and Nyquist for even lengths),
/// double the positive frequencies, zero the negative ones.
pub fn analytic_signal(samples: &[f64]) -> Vec<Complex64> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex64> = samples.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    forward.process(&mut buffer);

    for (k, value) in buffer.iter_mut().enumerate() {
        let gain = if k == 0 || (n % 2 == 0 && k == n / 2) {
            1.0
        } else if k < n.div_ceil(2) {
            2.0
        } else {
            0.0
        };
        *value *= gain;
    }

    inverse.process(&mut buffer);
    let scale = 1.0 / n as f64;
    buffer.iter_mut().for_each(|c| *c *= scale);
    buffer
}

/// Unwrap a phase sequence in place so consecutive steps never exceed pi
pub fn unwrap_phase(phase: &mut [f64]) {
    let mut offset = 0.0;
    for i in 1..phase.len() {
        let raw_prev = phase[i - 1] - offset;
        let step = phase[i] - raw_prev;
        let mut wrapped = (step + PI).rem_euclid(2.0 * PI) - PI;
        // Keep +pi steps as +pi rather than folding them to -pi
        if wrapped == -PI && step > 0.0 {
            wrapped = PI;
        }
        if step.abs() >= PI {
            offset += wrapped - step;
        }
        phase[i] += offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_of_sine_is_flat() {
        let n = 1000;
        let samples: Vec<f64> = (0..n)
            .map(|i| 0.5 * (2.0 * PI * 50.0 * i as f64 / n as f64).sin())
            .collect();
        let analytic = analytic_signal(&samples);
        for c in &analytic[100..900] {
            assert!((c.norm() - 0.5).abs() < 1e-9);
        }
        // Real part reproduces the input
        assert!((analytic[10].re - samples[10]).abs() < 1e-12);
    }

    #[test]
    fn test_unwrap_linear_ramp() {
        let true_phase: Vec<f64> = (0..50).map(|i| i as f64 * 0.9).collect();
        let mut wrapped: Vec<f64> = true_phase
            .iter()
            .map(|p| (p + PI).rem_euclid(2.0 * PI) - PI)
            .collect();
        unwrap_phase(&mut wrapped);
        for (a, b) in wrapped.iter().zip(&true_phase) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(analytic_signal(&[]).is_empty());
        let mut empty: Vec<f64> = Vec::new();
        unwrap_phase(&mut empty);
    }
}
