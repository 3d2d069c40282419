//! Configuration module for FrequenCipher

mod settings;

pub use settings::{
    AnalysisConfig, AnalysisConfigBuilder, ScorerKind, SpectralConfig, Stage, WaveletConfig,
};
