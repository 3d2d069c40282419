// src/config/settings.rs
//
// Analysis configuration: spectral parameters, anomaly strategy, execution mode.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::analysis::{AnomalyScorer, IsolationForestScorer, ZScoreScorer};
use crate::error::Result;

/// Stages of the analysis pipeline, in result order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Spectral,
    Phase,
    Backmask,
    Subliminal,
    Steganography,
    Temporal,
    Watermark,
    Anomaly,
}

impl Stage {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Spectral,
            Self::Phase,
            Self::Backmask,
            Self::Subliminal,
            Self::Steganography,
            Self::Temporal,
            Self::Watermark,
            Self::Anomaly,
        ]
    }

    /// The six sibling detectors that run over the same buffer
    pub fn detectors() -> Vec<Self> {
        vec![
            Self::Phase,
            Self::Backmask,
            Self::Subliminal,
            Self::Steganography,
            Self::Temporal,
            Self::Watermark,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spectral => "spectral",
            Self::Phase => "phase",
            Self::Backmask => "backmask",
            Self::Subliminal => "subliminal",
            Self::Steganography => "steganography",
            Self::Temporal => "temporal",
            Self::Watermark => "watermark",
            Self::Anomaly => "anomaly",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|s| s.name() == name.to_lowercase())
    }
}

/// Anomaly scoring strategy, chosen when the configuration is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScorerKind {
    /// Ensemble of random isolation trees
    #[default]
    IsolationForest,
    /// Mean absolute z-score of the feature vector against itself
    ZScore,
}

impl ScorerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation-forest",
            Self::ZScore => "zscore",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "isolation-forest" | "isolation_forest" | "iforest" => Some(Self::IsolationForest),
            "zscore" | "z-score" | "statistical" => Some(Self::ZScore),
            _ => None,
        }
    }

    /// Instantiate the scoring strategy
    pub fn build(&self) -> Box<dyn AnomalyScorer> {
        match self {
            Self::IsolationForest => Box::new(IsolationForestScorer::default()),
            Self::ZScore => Box::new(ZScoreScorer::default()),
        }
    }
}

/// Optional multi-level Haar decomposition of the mono signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletConfig {
    pub enabled: bool,
    pub levels: usize,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            levels: 4,
        }
    }
}

/// Parameters of the spectral decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// FFT window length in samples (clamped to the signal length)
    pub n_fft: usize,
    /// Hop between frames in samples
    pub hop_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Number of cepstral coefficients kept
    pub n_mfcc: usize,
    /// Fraction of spectral energy below the rolloff frequency
    pub rolloff_percent: f64,
    pub wavelet: WaveletConfig,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 20,
            rolloff_percent: 0.85,
            wavelet: WaveletConfig::default(),
        }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub spectral: SpectralConfig,
    pub scorer: ScorerKind,
    /// Fan stages out over a worker pool instead of running them in order
    pub parallel: bool,
    /// Abort the whole run after this many seconds
    pub timeout_secs: Option<f64>,
    /// Attach raw spectral matrices to the result
    pub include_matrices: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spectral: SpectralConfig::default(),
            scorer: ScorerKind::default(),
            parallel: true,
            timeout_secs: None,
            include_matrices: false,
        }
    }
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Builder for custom analysis configurations
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn n_fft(mut self, n_fft: usize) -> Self {
        self.config.spectral.n_fft = n_fft.max(2);
        self
    }

    pub fn hop_length(mut self, hop: usize) -> Self {
        self.config.spectral.hop_length = hop.max(1);
        self
    }

    pub fn n_mels(mut self, n_mels: usize) -> Self {
        self.config.spectral.n_mels = n_mels.max(1);
        self
    }

    pub fn wavelet(mut self, enabled: bool) -> Self {
        self.config.spectral.wavelet.enabled = enabled;
        self
    }

    pub fn wavelet_levels(mut self, levels: usize) -> Self {
        self.config.spectral.wavelet.levels = levels.max(1);
        self
    }

    pub fn scorer(mut self, scorer: ScorerKind) -> Self {
        self.config.scorer = scorer;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    pub fn include_matrices(mut self, include: bool) -> Self {
        self.config.include_matrices = include;
        self
    }

    pub fn build(self) -> AnalysisConfig {
        self.config
    }
}

impl Default for AnalysisConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_round_trip() {
        for stage in Stage::all() {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(Stage::from_name("unknown"), None);
        assert_eq!(Stage::detectors().len(), 6);
    }

    #[test]
    fn test_scorer_from_name() {
        assert_eq!(ScorerKind::from_name("zscore"), Some(ScorerKind::ZScore));
        assert_eq!(
            ScorerKind::from_name("Isolation-Forest"),
            Some(ScorerKind::IsolationForest)
        );
        assert_eq!(ScorerKind::from_name("svm"), None);
    }

    #[test]
    fn test_builder() {
        let config = AnalysisConfig::builder()
            .n_fft(1024)
            .hop_length(0)
            .wavelet(true)
            .scorer(ScorerKind::ZScore)
            .parallel(false)
            .build();

        assert_eq!(config.spectral.n_fft, 1024);
        assert_eq!(config.spectral.hop_length, 1);
        assert!(config.spectral.wavelet.enabled);
        assert_eq!(config.scorer, ScorerKind::ZScore);
        assert!(!config.parallel);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"scorer": "z-score", "spectral": {"n_mels": 64}}"#).unwrap();
        assert_eq!(config.scorer, ScorerKind::ZScore);
        assert_eq!(config.spectral.n_mels, 64);
        assert_eq!(config.spectral.n_fft, 2048);
        assert!(config.parallel);
    }

    #[test]
    fn test_timeout_ignores_non_positive() {
        let config = AnalysisConfig::builder().timeout_secs(0.0).build();
        assert!(config.timeout().is_none());
        let config = AnalysisConfig::builder().timeout_secs(1.5).build();
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
    }
}
