// src/core/analysis/anomaly.rs
//
// Anomaly scoring over the flattened spectral summary.
// Strategies are chosen by configuration (see `ScorerKind`), never by probing at runtime.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::detection::DetectorResult;
use crate::error::{ForensicError, Result};

pub const ANOMALY_KEYS: &[&str] = &["anomaly_score"];

const ZSCORE_EPSILON: f64 = 1e-8;

/// Scores a set of observation rows; higher means more anomalous
pub trait AnomalyScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, observations: &[Vec<f64>]) -> Result<f64>;

    fn score_result(&self, observations: &[Vec<f64>]) -> Result<DetectorResult> {
        Ok(DetectorResult::from_pairs([(
            "anomaly_score",
            self.score(observations)?,
        )]))
    }
}

/// Rows restricted to the columns that are finite in every row.
/// Errors when there is nothing to score; `None` when no finite column remains.
fn finite_columns(observations: &[Vec<f64>]) -> Result<Option<Vec<Vec<f64>>>> {
    let width = observations.first().map_or(0, |row| row.len());
    if width == 0 {
        return Err(ForensicError::computation(
            "anomaly scoring needs a non-empty feature vector",
        ));
    }
    if observations.iter().any(|row| row.len() != width) {
        return Err(ForensicError::computation(
            "observation rows differ in length",
        ));
    }

    let keep: Vec<usize> = (0..width)
        .filter(|&c| observations.iter().all(|row| row[c].is_finite()))
        .collect();
    if keep.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        observations
            .iter()
            .map(|row| keep.iter().map(|&c| row[c]).collect())
            .collect(),
    ))
}

/// Mean absolute z-score of every finite value against the mean/std of all of them
#[derive(Debug, Clone, Default)]
pub struct ZScoreScorer;

impl AnomalyScorer for ZScoreScorer {
    fn name(&self) -> &'static str {
        "zscore"
    }

    fn score(&self, observations: &[Vec<f64>]) -> Result<f64> {
        let Some(rows) = finite_columns(observations)? else {
            return Ok(f64::NAN);
        };
        let values: Vec<f64> = rows.into_iter().flatten().collect();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt();
        Ok(values
            .iter()
            .map(|v| (v - mean).abs() / (std + ZSCORE_EPSILON))
            .sum::<f64>()
            / n)
    }
}

/// Isolation forest: anomalies are isolated by fewer random axis-aligned splits
#[derive(Debug, Clone)]
pub struct IsolationForestScorer {
    pub n_trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for IsolationForestScorer {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            seed: 0,
        }
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl IsolationForestScorer {
    /// Per-row scores `2^(-E[h(x)] / c(psi))` in `(0, 1]`
    pub fn score_rows(&self, observations: &[Vec<f64>]) -> Result<Vec<f64>> {
        let Some(rows) = finite_columns(observations)? else {
            return Ok(vec![f64::NAN; observations.len()]);
        };

        let psi = self.max_samples.max(1).min(rows.len());
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = Pcg64::seed_from_u64(self.seed);

        let trees: Vec<Node> = (0..self.n_trees.max(1))
            .map(|_| {
                let subset: Vec<&[f64]> = sample(&mut rng, rows.len(), psi)
                    .into_iter()
                    .map(|i| rows[i].as_slice())
                    .collect();
                build_tree(&subset, 0, height_limit, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(psi);
        Ok(rows
            .iter()
            .map(|row| {
                let mean_depth = trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>()
                    / trees.len() as f64;
                let ratio = if normalizer > 0.0 {
                    mean_depth / normalizer
                } else {
                    1.0
                };
                2f64.powf(-ratio)
            })
            .collect())
    }
}

impl AnomalyScorer for IsolationForestScorer {
    fn name(&self) -> &'static str {
        "isolation-forest"
    }

    fn score(&self, observations: &[Vec<f64>]) -> Result<f64> {
        let scores = self.score_rows(observations)?;
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

fn build_tree(rows: &[&[f64]], depth: usize, limit: usize, rng: &mut Pcg64) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    let width = rows[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r[feature]), hi.max(r[feature]))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        rows.iter().partition(|r| r[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, depth + 1, limit, rng)),
        right: Box::new(build_tree(&right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + 0.577_215_664_901_532_9;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_observation_scores_half() {
        let scorer = IsolationForestScorer::default();
        let score = scorer.score(&[vec![1.0, 5.0, -3.0, 0.2]]).unwrap();
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_outlier_row_scores_highest() {
        let mut rows: Vec<Vec<f64>> = (0..64)
            .map(|i| vec![(i % 8) as f64 * 0.1, (i / 8) as f64 * 0.1])
            .collect();
        rows.push(vec![25.0, -30.0]);
        let scores = IsolationForestScorer::default().score_rows(&rows).unwrap();
        let outlier = scores[64];
        let inlier_mean = scores[..64].iter().sum::<f64>() / 64.0;
        assert!(outlier > inlier_mean, "{} vs {}", outlier, inlier_mean);
        assert!(scores.iter().all(|s| *s > 0.0 && *s <= 1.0));
    }

    #[test]
    fn test_forest_is_deterministic() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i * i) as f64]).collect();
        let scorer = IsolationForestScorer::default();
        assert_eq!(scorer.score(&rows).unwrap(), scorer.score(&rows).unwrap());
    }

    #[test]
    fn test_zscore_of_symmetric_vector() {
        // mean 0, std 1 -> every |z| is 1
        let score = ZScoreScorer.score(&[vec![1.0, -1.0, 1.0, -1.0]]).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zscore_ignores_non_finite_and_constant_is_zero() {
        let score = ZScoreScorer
            .score(&[vec![2.0, f64::NAN, 2.0, f64::INFINITY]])
            .unwrap();
        assert_eq!(score, 0.0);
        assert!(ZScoreScorer.score(&[vec![f64::NAN]]).unwrap().is_nan());
    }

    #[test]
    fn test_empty_vector_is_error() {
        for scorer in [
            Box::new(ZScoreScorer) as Box<dyn AnomalyScorer>,
            Box::new(IsolationForestScorer::default()),
        ] {
            assert!(matches!(
                scorer.score(&[vec![]]),
                Err(ForensicError::Computation(_))
            ));
            assert!(scorer.score(&[]).is_err());
        }
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > 9.0 && average_path_length(256) < 11.0);
    }
}
