//! Statistical summaries and scalar signal measures
//!
//! [`summarise`] is the reduction every stage uses: it drops non-finite values and
//! reports mean, population standard deviation, median, extrema and the linearly
//! interpolated quartiles. An input with no finite values yields the all-NaN sentinel.

use serde::{Deserialize, Serialize};

/// Field names of [`SummaryStatistics`], in report order
pub const SUMMARY_FIELDS: [&str; 7] = [
    "mean",
    "std",
    "median",
    "min",
    "max",
    "percentile_25",
    "percentile_75",
];

/// Seven-value robust summary of a numeric array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
}

impl SummaryStatistics {
    /// Sentinel for "no finite data"
    pub fn nan() -> Self {
        Self::constant(f64::NAN)
    }

    /// Sentinel for "no variation detected"
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    fn constant(value: f64) -> Self {
        Self {
            mean: value,
            std: value,
            median: value,
            min: value,
            max: value,
            percentile_25: value,
            percentile_75: value,
        }
    }

    /// True for the all-NaN sentinel
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_nan())
    }

    /// `(name, value)` pairs in [`SUMMARY_FIELDS`] order
    pub fn fields(&self) -> [(&'static str, f64); 7] {
        [
            (SUMMARY_FIELDS[0], self.mean),
            (SUMMARY_FIELDS[1], self.std),
            (SUMMARY_FIELDS[2], self.median),
            (SUMMARY_FIELDS[3], self.min),
            (SUMMARY_FIELDS[4], self.max),
            (SUMMARY_FIELDS[5], self.percentile_25),
            (SUMMARY_FIELDS[6], self.percentile_75),
        ]
    }
}

/// Summarise the finite subset of `values`
pub fn summarise<I>(values: I) -> SummaryStatistics
where
    I: IntoIterator<Item = f64>,
{
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return SummaryStatistics::nan();
    }

    finite.sort_by(|a, b| a.total_cmp(b));

    let mean = mean(&finite);
    SummaryStatistics {
        mean,
        std: population_std_with_mean(&finite, mean),
        median: percentile_sorted(&finite, 50.0),
        min: finite[0],
        max: finite[finite.len() - 1],
        percentile_25: percentile_sorted(&finite, 25.0),
        percentile_75: percentile_sorted(&finite, 75.0),
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice
pub fn percentile_sorted(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (percentile / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by N)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

pub fn population_std(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

fn population_std_with_mean(values: &[f64], mean: f64) -> f64 {
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Pearson correlation; NaN when either side has zero variance or lengths differ
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let ma = mean(a);
    let mb = mean(b);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    if va <= 0.0 || vb <= 0.0 {
        return f64::NAN;
    }
    cov / (va.sqrt() * vb.sqrt())
}

/// Zero-crossing rate
pub fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();

    crossings as f64 / (samples.len() - 1) as f64
}

/// Autocorrelation normalized by signal energy
pub fn autocorrelation(samples: &[f64], max_lag: usize) -> Vec<f64> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let max_lag = max_lag.min(n - 1);

    let energy: f64 = samples.iter().map(|s| s * s).sum();
    if energy < 1e-12 {
        return vec![0.0; max_lag + 1];
    }

    (0..=max_lag)
        .map(|lag| {
            let sum: f64 = samples[..n - lag]
                .iter()
                .zip(&samples[lag..])
                .map(|(a, b)| a * b)
                .sum();
            sum / energy
        })
        .collect()
}

/// Spectral flatness (Wiener entropy)
/// Returns 1.0 for white noise, approaches 0.0 for tonal signals
pub fn spectral_flatness(magnitudes: &[f64]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let n = magnitudes.len() as f64;

    let log_sum: f64 = magnitudes.iter().map(|&m| m.max(1e-10).ln()).sum();
    let geometric_mean = (log_sum / n).exp();
    let arithmetic_mean = magnitudes.iter().map(|&m| m.max(1e-10)).sum::<f64>() / n;

    geometric_mean / arithmetic_mean
}

/// Shannon entropy of a density-normalized histogram.
///
/// Bins span `[min, max]` of the finite input (a degenerate range is widened by 0.5 on
/// each side). Each density value is floored by `1e-12` inside the log.
pub fn histogram_entropy(values: &[f64], bins: usize) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return 0.0;
    }

    let (mut lo, mut hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi <= lo {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in &finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let total = finite.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let density = c as f64 / (total * width);
            -density * (density + 1e-12).ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_nan_sentinel() {
        assert!(summarise(Vec::<f64>::new()).is_empty());
        assert!(summarise(vec![f64::NAN, f64::INFINITY, f64::NEG_INFINITY]).is_empty());
    }

    #[test]
    fn test_single_value() {
        let s = summarise(vec![5.0]);
        // Population std of one value is zero
        assert_eq!(s.std, 0.0);
        for (field, value) in s.fields() {
            if field != "std" {
                assert_eq!(value, 5.0, "{}", field);
            }
        }
    }

    #[test]
    fn test_quartiles_interpolate() {
        let s = summarise(vec![4.0, 1.0, 3.0, 2.0]);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.percentile_25 - 1.75).abs() < 1e-12);
        assert!((s.percentile_75 - 3.25).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let s = summarise(vec![1.0, f64::NAN, 3.0, f64::INFINITY]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.max, 3.0);
        assert!(s.fields().iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn test_pearson_degenerate() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_crossing_rate() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[1.0, 1.0, 1.0]), 0.0);
        assert_eq!(zero_crossing_rate(&[1.0]), 0.0);
    }

    #[test]
    fn test_spectral_flatness_tonal() {
        let mut mags = vec![0.001; 100];
        mags[50] = 1.0;
        assert!(spectral_flatness(&mags) < 0.1);
    }

    #[test]
    fn test_spectral_flatness_noise() {
        assert!(spectral_flatness(&vec![1.0; 100]) > 0.99);
    }

    #[test]
    fn test_histogram_entropy_spread() {
        let constant = histogram_entropy(&vec![0.3; 100], 64);
        let spread: Vec<f64> = (0..6400).map(|i| i as f64 / 6400.0).collect();
        let uniform = histogram_entropy(&spread, 64);
        // Density close to 1.0 in every bin contributes almost nothing
        assert!(uniform.abs() < 0.1);
        // All mass in one bin of width 1/64 -> density 64 -> -64 ln 64
        assert!(constant < uniform);
    }

    #[test]
    fn test_autocorrelation_periodic() {
        let signal: Vec<f64> = (0..64).map(|i| if i % 8 < 4 { 1.0 } else { -1.0 }).collect();
        let ac = autocorrelation(&signal, 16);
        assert!((ac[0] - 1.0).abs() < 1e-12);
        assert!(ac[8] > ac[4]);
    }
}
