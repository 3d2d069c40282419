// src/core/audio.rs
//
// The normalized signal handed from ingestion to the analysis core.
// Samples are expected to be DC-removed and peak-normalized; nothing here re-normalizes.

use std::path::{Path, PathBuf};

use crate::error::{ForensicError, Result};

/// Sample storage: a flat mono track or channel-major multichannel data
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Mono(Vec<f64>),
    Multi(Vec<Vec<f64>>),
}

/// Immutable audio buffer consumed by the pipeline
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Samples,
    sample_rate: u32,
    source: Option<PathBuf>,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        Self::new(Samples::Mono(samples), sample_rate)
    }

    pub fn multichannel(channels: Vec<Vec<f64>>, sample_rate: u32) -> Result<Self> {
        Self::new(Samples::Multi(channels), sample_rate)
    }

    pub fn new(samples: Samples, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ForensicError::computation("sample rate must be positive"));
        }
        if let Samples::Multi(channels) = &samples {
            let Some(first) = channels.first() else {
                return Err(ForensicError::computation("multichannel buffer has no channels"));
            };
            if channels.iter().any(|c| c.len() != first.len()) {
                return Err(ForensicError::computation(
                    "multichannel buffer has channels of unequal length",
                ));
            }
        }
        Ok(Self {
            samples,
            sample_rate,
            source: None,
        })
    }

    /// Record the file the buffer was decoded from
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn channel_count(&self) -> usize {
        match &self.samples {
            Samples::Mono(_) => 1,
            Samples::Multi(channels) => channels.len(),
        }
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        match &self.samples {
            Samples::Mono(s) => s.len(),
            Samples::Multi(channels) => channels.first().map_or(0, |c| c.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Borrow every channel as a slice
    pub fn channels(&self) -> Vec<&[f64]> {
        match &self.samples {
            Samples::Mono(s) => vec![s.as_slice()],
            Samples::Multi(channels) => channels.iter().map(|c| c.as_slice()).collect(),
        }
    }

    /// All samples, channel after channel
    pub fn channel_major(&self) -> impl Iterator<Item = f64> + '_ {
        self.channels().into_iter().flat_map(|c| c.iter().copied())
    }

    /// Mean across channels; a mono buffer is copied as-is
    pub fn downmix(&self) -> Vec<f64> {
        match &self.samples {
            Samples::Mono(s) => s.clone(),
            Samples::Multi(channels) => downmix_channels(channels),
        }
    }
}

/// Average channel-major data into one track
pub fn downmix_channels(channels: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = channels.first() else {
        return Vec::new();
    };
    let count = channels.len() as f64;
    (0..first.len())
        .map(|i| channels.iter().map(|c| c[i]).sum::<f64>() / count)
        .collect()
}
