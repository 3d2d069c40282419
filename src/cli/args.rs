//! CLI argument parsing

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use crate::config::{AnalysisConfig, AnalysisConfigBuilder, ScorerKind};
use crate::core::LoadOptions;
use crate::error::Result;

/// Resampling target when neither `--sample-rate` nor `--native-rate` is given
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Parsed CLI arguments
#[derive(Parser, Debug)]
#[command(name = "frequencipher", version)]
#[command(about = "Forensic analysis of audio files: hidden content, tampering and steganography cues")]
pub struct Args {
    /// Input audio file (wav, flac, mp3, ogg)
    pub input: PathBuf,

    /// Resample to this rate before analysis
    #[arg(long, value_name = "HZ", conflicts_with = "native_rate")]
    pub sample_rate: Option<u32>,

    /// Keep the file's native sample rate
    #[arg(long)]
    pub native_rate: bool,

    /// Keep every channel instead of downmixing at load time
    #[arg(long)]
    pub stereo: bool,

    /// Attach the raw spectral matrices to the JSON dump
    #[arg(long)]
    pub include_matrices: bool,

    /// Write the full result as JSON
    #[arg(long, value_name = "PATH")]
    pub dump: Option<PathBuf>,

    /// Write a plain-text forensic report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Anomaly scoring strategy (isolation-forest, zscore)
    #[arg(long, value_parser = parse_scorer)]
    pub scorer: Option<ScorerKind>,

    /// Add Haar wavelet bands to the spectral stage
    #[arg(long)]
    pub wavelet: bool,

    /// Haar decomposition depth; implies --wavelet
    #[arg(long, value_name = "N")]
    pub wavelet_levels: Option<usize>,

    /// Abort the analysis after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Run stages one after another instead of on a worker pool
    #[arg(long)]
    pub sequential: bool,

    /// JSON analysis configuration; flags override its values
    #[arg(long, value_name = "PATH", env = "FREQUENCIPHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_scorer(value: &str) -> std::result::Result<ScorerKind, String> {
    ScorerKind::from_name(value)
        .ok_or_else(|| format!("Unknown scorer: {} (use isolation-forest or zscore)", value))
}

impl Args {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            target_sample_rate: if self.native_rate {
                None
            } else {
                Some(self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE))
            },
            downmix_to_mono: !self.stereo,
        }
    }

    /// Configuration file (if any) with the command-line overrides applied
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let base = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        let mut builder = AnalysisConfigBuilder::from_config(base);
        if let Some(scorer) = self.scorer {
            builder = builder.scorer(scorer);
        }
        if self.wavelet {
            builder = builder.wavelet(true);
        }
        if let Some(levels) = self.wavelet_levels {
            builder = builder.wavelet(true).wavelet_levels(levels);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout_secs(timeout);
        }
        if self.sequential {
            builder = builder.parallel(false);
        }
        if self.include_matrices {
            builder = builder.include_matrices(true);
        }
        Ok(builder.build())
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
