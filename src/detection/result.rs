//! Result types: flat per-detector metric maps and the nested per-run result tree

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::Stage;
use crate::core::dsp::SummaryStatistics;

/// Key added to a stage that was isolated after an internal failure
pub const STAGE_FAILED_KEY: &str = "stage_failed";

/// Flat mapping of metric name to value produced by one detector
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectorResult(BTreeMap<String, f64>);

impl DetectorResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Error-tagged result: every expected key set to NaN plus [`STAGE_FAILED_KEY`]
    pub fn failed(keys: &[&str]) -> Self {
        let mut result = Self::from_pairs(keys.iter().map(|k| (*k, f64::NAN)));
        result.insert(STAGE_FAILED_KEY, 1.0);
        result
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.contains_key(STAGE_FAILED_KEY)
    }
}

impl From<DetectorResult> for ResultValue {
    fn from(result: DetectorResult) -> Self {
        ResultValue::Map(
            result
                .0
                .into_iter()
                .map(|(k, v)| (k, ResultValue::Scalar(v)))
                .collect(),
        )
    }
}

/// Node of the result tree handed to report renderers
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Scalar(f64),
    List(Vec<ResultValue>),
    Map(BTreeMap<String, ResultValue>),
}

impl ResultValue {
    pub fn map() -> Self {
        ResultValue::Map(BTreeMap::new())
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ResultValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ResultValue>> {
        match self {
            ResultValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a child of a map node
    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Insert into a map node; no-op on scalars and lists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ResultValue>) {
        if let ResultValue::Map(m) = self {
            m.insert(key.into(), value.into());
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResultValue::Scalar(_) => false,
            ResultValue::List(items) => items.is_empty(),
            ResultValue::Map(m) => m.is_empty(),
        }
    }

    /// Bit-exact structural equality (NaN equals NaN)
    pub fn identical(&self, other: &ResultValue) -> bool {
        match (self, other) {
            (ResultValue::Scalar(a), ResultValue::Scalar(b)) => a.to_bits() == b.to_bits(),
            (ResultValue::List(a), ResultValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
            }
            (ResultValue::Map(a), ResultValue::Map(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
            }
            _ => false,
        }
    }
}

impl From<f64> for ResultValue {
    fn from(value: f64) -> Self {
        ResultValue::Scalar(value)
    }
}

impl From<Vec<f64>> for ResultValue {
    fn from(values: Vec<f64>) -> Self {
        ResultValue::List(values.into_iter().map(ResultValue::Scalar).collect())
    }
}

impl From<SummaryStatistics> for ResultValue {
    fn from(stats: SummaryStatistics) -> Self {
        ResultValue::Map(
            stats
                .fields()
                .iter()
                .map(|(k, v)| (k.to_string(), ResultValue::Scalar(*v)))
                .collect(),
        )
    }
}

/// Complete analysis result: stage name -> result subtree
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    stages: BTreeMap<String, ResultValue>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ResultValue>) {
        self.stages.insert(name.into(), value.into());
    }

    pub fn insert_stage(&mut self, stage: Stage, value: impl Into<ResultValue>) {
        self.insert(stage.name(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ResultValue> {
        self.stages.get(name)
    }

    pub fn stage(&self, stage: Stage) -> Option<&ResultValue> {
        self.get(stage.name())
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.stages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stages isolated after an internal failure
    pub fn failed_stages(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| v.get(STAGE_FAILED_KEY).is_some())
            .map(|(k, _)| k)
            .collect()
    }

    /// Bit-exact comparison of two results
    pub fn identical(&self, other: &AnalysisResult) -> bool {
        self.stages.len() == other.stages.len()
            && self
                .stages
                .iter()
                .zip(&other.stages)
                .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_keeps_keys() {
        let result = DetectorResult::failed(&["a", "b"]);
        assert!(result.is_failed());
        assert!(result.get("a").unwrap().is_nan());
        assert!(result.get("b").unwrap().is_nan());
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_json_nests_and_nulls_nan() {
        let mut result = AnalysisResult::new();
        result.insert_stage(
            Stage::Phase,
            DetectorResult::from_pairs([("phase_coherence", 0.5), ("phase_entropy", f64::NAN)]),
        );
        let json = result.to_json_pretty().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["phase"]["phase_coherence"], 0.5);
        assert!(parsed["phase"]["phase_entropy"].is_null());
    }

    #[test]
    fn test_identical_treats_nan_as_equal() {
        let a = ResultValue::from(vec![1.0, f64::NAN]);
        let b = ResultValue::from(vec![1.0, f64::NAN]);
        let c = ResultValue::from(vec![1.0, 2.0]);
        assert!(a.identical(&b));
        assert!(!a.identical(&c));
    }

    #[test]
    fn test_summary_converts_to_map() {
        let value = ResultValue::from(SummaryStatistics::zero());
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 7);
        assert_eq!(value.get("percentile_75").and_then(|v| v.as_scalar()), Some(0.0));
    }

    #[test]
    fn test_failed_stages() {
        let mut result = AnalysisResult::new();
        result.insert_stage(Stage::Phase, DetectorResult::failed(&["x"]));
        result.insert_stage(Stage::Backmask, DetectorResult::from_pairs([("y", 1.0)]));
        assert_eq!(result.failed_stages(), vec!["phase"]);
    }
}
