//! Pitch-class (chroma) projection and the tonal-centroid (tonnetz) transform

use std::f64::consts::PI;

/// Lowest frequency mapped to a pitch class (C1)
const CHROMA_FMIN_HZ: f64 = 32.70;

pub const N_CHROMA: usize = 12;
pub const N_TONNETZ: usize = 6;

/// Maps FFT bins to the 12 pitch classes (C = 0 .. B = 11)
#[derive(Debug, Clone)]
pub struct ChromaFilterbank {
    /// Pitch class of each bin, `None` below C1 and for DC
    bin_classes: Vec<Option<usize>>,
}

impl ChromaFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let bin_classes = (0..bins)
            .map(|k| {
                let freq = k as f64 * sample_rate as f64 / n_fft as f64;
                if freq < CHROMA_FMIN_HZ {
                    return None;
                }
                // Semitones relative to A4, shifted so that C is class 0
                let semitone = (12.0 * (freq / 440.0).log2()).round() as i64 + 9;
                Some(semitone.rem_euclid(N_CHROMA as i64) as usize)
            })
            .collect();
        Self { bin_classes }
    }

    /// Chroma vector of one power frame, scaled so its largest class is 1.0
    pub fn apply(&self, power: &[f64]) -> [f64; N_CHROMA] {
        let mut chroma = [0.0; N_CHROMA];
        for (class, &p) in self.bin_classes.iter().zip(power) {
            if let Some(c) = class {
                chroma[*c] += p;
            }
        }
        let peak = chroma.iter().fold(0.0f64, |a, &b| a.max(b));
        if peak > 0.0 {
            chroma.iter_mut().for_each(|c| *c /= peak);
        }
        chroma
    }
}

/// Project a chroma vector onto the six tonal-centroid axes
/// (circle of fifths, minor thirds, major thirds; x/y each).
///
/// The chroma is L1-normalized first; an all-zero chroma maps to the origin.
pub fn tonnetz(chroma: &[f64; N_CHROMA]) -> [f64; N_TONNETZ] {
    const SCALE: [f64; N_TONNETZ] = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];
    const RADIUS: [f64; N_TONNETZ] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    let total: f64 = chroma.iter().map(|c| c.abs()).sum();
    let mut out = [0.0; N_TONNETZ];
    if total <= 0.0 {
        return out;
    }

    for (axis, value) in out.iter_mut().enumerate() {
        let offset = if axis % 2 == 0 { 0.5 } else { 0.0 };
        *value = chroma
            .iter()
            .enumerate()
            .map(|(pc, &c)| {
                let angle = PI * (SCALE[axis] * pc as f64 - offset);
                RADIUS[axis] * angle.cos() * c / total
            })
            .sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a440_maps_to_class_9() {
        let sr = 44100;
        let n_fft = 44100;
        let fb = ChromaFilterbank::new(sr, n_fft);
        let mut power = vec![0.0; n_fft / 2 + 1];
        power[440] = 1.0;
        let chroma = fb.apply(&power);
        assert_eq!(chroma[9], 1.0);
        assert_eq!(chroma.iter().filter(|&&c| c > 0.0).count(), 1);
    }

    #[test]
    fn test_tonnetz_silence_is_origin() {
        assert_eq!(tonnetz(&[0.0; N_CHROMA]), [0.0; N_TONNETZ]);
    }

    #[test]
    fn test_tonnetz_single_class() {
        let mut chroma = [0.0; N_CHROMA];
        chroma[0] = 1.0;
        let t = tonnetz(&chroma);
        // C: angle 0 on odd axes, -pi/2 on even axes
        assert!(t[0].abs() < 1e-12);
        assert!((t[1] - 1.0).abs() < 1e-12);
        assert!((t[5] - 0.5).abs() < 1e-12);
    }
}
