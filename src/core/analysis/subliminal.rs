// src/core/analysis/subliminal.rs
//
// Subliminal content detection: energy outside the audible band plus
// amplitude/frequency modulation cues from the analytic signal.

use std::f64::consts::PI;

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::hilbert::{analytic_signal, unwrap_phase};
use crate::core::dsp::{real_spectrum, summarise, SummaryStatistics};
use crate::detection::DetectorResult;
use crate::error::Result;

pub const SUBLIMINAL_KEYS: &[&str] = &[
    "infrasonic_energy",
    "ultrasonic_energy",
    "audible_energy",
    "subliminal_energy_ratio",
    "am_envelope_std",
    "am_envelope_p75",
    "fm_deviation_std",
    "fm_deviation_p75",
];

const INFRASONIC_LIMIT_HZ: f64 = 20.0;
const ULTRASONIC_LIMIT_HZ: f64 = 20_000.0;
const RATIO_EPSILON: f64 = 1e-8;

/// Subliminal analysis results
#[derive(Debug, Clone)]
pub struct SubliminalAnalysis {
    /// Mean spectral magnitude below 20 Hz
    pub infrasonic_energy: f64,
    /// Mean spectral magnitude above 20 kHz
    pub ultrasonic_energy: f64,
    pub audible_energy: f64,
    pub energy_ratio: f64,
    pub envelope: SummaryStatistics,
    pub instantaneous_frequency: SummaryStatistics,
}

impl SubliminalAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("infrasonic_energy", self.infrasonic_energy),
            ("ultrasonic_energy", self.ultrasonic_energy),
            ("audible_energy", self.audible_energy),
            ("subliminal_energy_ratio", self.energy_ratio),
            ("am_envelope_std", self.envelope.std),
            ("am_envelope_p75", self.envelope.percentile_75),
            ("fm_deviation_std", self.instantaneous_frequency.std),
            ("fm_deviation_p75", self.instantaneous_frequency.percentile_75),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubliminalDetector;

impl SubliminalDetector {
    pub fn analyze(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<SubliminalAnalysis> {
        let spectrum = real_spectrum(samples)?;
        let n = samples.len().max(1) as f64;

        let mut infra = BandAccumulator::default();
        let mut ultra = BandAccumulator::default();
        let mut audible = BandAccumulator::default();
        for (k, bin) in spectrum.iter().enumerate() {
            let freq = k as f64 * sample_rate as f64 / n;
            let magnitude = bin.norm();
            if freq < INFRASONIC_LIMIT_HZ {
                infra.add(magnitude);
            } else if freq > ULTRASONIC_LIMIT_HZ {
                ultra.add(magnitude);
            } else {
                audible.add(magnitude);
            }
        }
        cancel.check()?;

        let (infrasonic_energy, ultrasonic_energy, audible_energy) =
            (infra.mean(), ultra.mean(), audible.mean());
        let energy_ratio = (infrasonic_energy + ultrasonic_energy) / (audible_energy + RATIO_EPSILON);

        let analytic = analytic_signal(samples);
        let envelope = summarise(analytic.iter().map(|c| c.norm()));

        let mut phase: Vec<f64> = analytic.iter().map(|c| c.arg()).collect();
        unwrap_phase(&mut phase);
        let frequency: Vec<f64> = phase
            .windows(2)
            .map(|w| (w[1] - w[0]) / (2.0 * PI) * sample_rate as f64)
            .collect();
        // Too short to difference means "no modulation", not "no data"
        let instantaneous_frequency = if frequency.len() < 2 {
            SummaryStatistics::zero()
        } else {
            summarise(frequency)
        };

        Ok(SubliminalAnalysis {
            infrasonic_energy,
            ultrasonic_energy,
            audible_energy,
            energy_ratio,
            envelope,
            instantaneous_frequency,
        })
    }
}

#[derive(Default)]
struct BandAccumulator {
    sum: f64,
    count: usize,
}

impl BandAccumulator {
    fn add(&mut self, magnitude: f64) {
        self.sum += magnitude;
        self.count += 1;
    }

    /// Mean magnitude; an empty band reports 0
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

impl Detector for SubliminalDetector {
    fn stage(&self) -> Stage {
        Stage::Subliminal
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        SUBLIMINAL_KEYS
    }

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult> {
        Ok(self
            .analyze(input.mono, input.sample_rate(), cancel)?
            .to_result())
    }
}
