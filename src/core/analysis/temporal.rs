// src/core/analysis/temporal.rs
//
// Temporal analysis: zero-crossing rate, onset strength, tempo estimation
// and dynamic-programming beat tracking.

use log::debug;

use super::{Detector, DetectorInput};
use crate::config::Stage;
use crate::core::cancel::CancelToken;
use crate::core::dsp::mel::{power_to_db, MelFilterbank};
use crate::core::dsp::stats::{autocorrelation, percentile_sorted, population_std, zero_crossing_rate};
use crate::core::dsp::{summarise, FrameLayout, StftProcessor, SummaryStatistics};
use crate::detection::DetectorResult;
use crate::error::Result;

pub const TEMPORAL_KEYS: &[&str] = &[
    "zcr_mean",
    "zcr_std",
    "tempo_bpm",
    "beat_count",
    "beat_interval_std",
    "beat_interval_p75",
];

const ONSET_MELS: usize = 128;
const TOP_DB: f64 = 80.0;
const MIN_BPM: f64 = 30.0;
const MAX_BPM: f64 = 300.0;
/// Centre of the log-normal tempo prior
const PRIOR_BPM: f64 = 120.0;
/// Width of the tempo prior in octaves
const PRIOR_OCTAVES: f64 = 1.0;
/// Penalty on deviating from the tempo period between two beats
const TIGHTNESS: f64 = 100.0;
/// Frames between cancellation checks in the beat tracker
const BEAT_CANCEL_INTERVAL: usize = 256;

/// Temporal analysis results
#[derive(Debug, Clone)]
pub struct TemporalAnalysis {
    pub zcr: SummaryStatistics,
    /// Estimated tempo, 0 when no periodicity was found
    pub tempo_bpm: f64,
    /// Beat times in seconds
    pub beat_times: Vec<f64>,
    /// Inter-beat interval summary; the NaN sentinel with fewer than two beats
    pub intervals: SummaryStatistics,
}

impl TemporalAnalysis {
    pub fn to_result(&self) -> DetectorResult {
        DetectorResult::from_pairs([
            ("zcr_mean", self.zcr.mean),
            ("zcr_std", self.zcr.std),
            ("tempo_bpm", self.tempo_bpm),
            ("beat_count", self.beat_times.len() as f64),
            ("beat_interval_std", self.intervals.std),
            ("beat_interval_p75", self.intervals.percentile_75),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct TemporalDetector {
    pub n_fft: usize,
    pub hop_length: usize,
}

impl Default for TemporalDetector {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
        }
    }
}

impl TemporalDetector {
    pub fn analyze(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<TemporalAnalysis> {
        let zcr = summarise(self.frame_zero_crossings(samples));

        let (onset, layout) = self.onset_envelope(samples, sample_rate, cancel)?;
        let frame_rate = sample_rate as f64 / layout.hop as f64;

        let tempo_bpm = estimate_tempo(&onset, frame_rate).unwrap_or(0.0);
        let beat_frames = if tempo_bpm > 0.0 {
            track_beats(&onset, frame_rate, tempo_bpm, cancel)?
        } else {
            Vec::new()
        };
        debug!(
            "Temporal: tempo={:.1} BPM, {} beats over {} onset frames",
            tempo_bpm,
            beat_frames.len(),
            onset.len()
        );

        let beat_times: Vec<f64> = beat_frames
            .iter()
            .map(|&f| (f * layout.hop) as f64 / sample_rate as f64)
            .collect();
        let intervals = if beat_times.len() < 2 {
            SummaryStatistics::nan()
        } else {
            summarise(beat_times.windows(2).map(|w| w[1] - w[0]))
        };

        Ok(TemporalAnalysis {
            zcr,
            tempo_bpm,
            beat_times,
            intervals,
        })
    }

    /// Zero-crossing rate of every analysis frame
    fn frame_zero_crossings(&self, samples: &[f64]) -> Vec<f64> {
        let layout = FrameLayout::resolve(samples.len(), self.n_fft, self.hop_length);
        let mut frame = vec![0.0; layout.window];
        (0..layout.frames)
            .map(|index| {
                layout.fill_frame(samples, index, &mut frame);
                let end = samples.len().saturating_sub(index * layout.hop).min(layout.window);
                zero_crossing_rate(&frame[..end.max(1)])
            })
            .collect()
    }

    /// Mean positive first difference of the dB mel spectrogram, one value per frame
    fn onset_envelope(
        &self,
        samples: &[f64],
        sample_rate: u32,
        cancel: &CancelToken,
    ) -> Result<(Vec<f64>, FrameLayout)> {
        let stft = StftProcessor::for_signal(samples, self.n_fft, self.hop_length);
        let layout = *stft.layout();
        let magnitudes = stft.magnitude_frames(samples, cancel)?;
        let mel_bank = MelFilterbank::new(sample_rate, layout.window, ONSET_MELS);

        let mut mel_db: Vec<f64> = magnitudes
            .iter()
            .flat_map(|frame| {
                let power: Vec<f64> = frame.iter().map(|m| m * m).collect();
                mel_bank.apply(&power)
            })
            .collect();
        power_to_db(&mut mel_db, TOP_DB);

        let bands = mel_bank.n_mels();
        let columns: Vec<&[f64]> = mel_db.chunks(bands).collect();
        let mut onset = Vec::with_capacity(columns.len());
        onset.push(0.0);
        for pair in columns.windows(2) {
            let rise: f64 = pair[1]
                .iter()
                .zip(pair[0])
                .map(|(now, before)| (now - before).max(0.0))
                .sum();
            onset.push(rise / bands as f64);
        }
        Ok((onset, layout))
    }
}

/// Tempo from the onset autocorrelation weighted by a log-normal prior around 120 BPM.
/// `None` when the envelope carries no energy or no lag falls inside 30..300 BPM.
fn estimate_tempo(onset: &[f64], frame_rate: f64) -> Option<f64> {
    if onset.len() < 2 || onset.iter().all(|&v| v <= 0.0) {
        return None;
    }

    let min_lag = ((60.0 * frame_rate / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frame_rate / MIN_BPM).ceil() as usize).min(onset.len() - 1);
    if min_lag > max_lag {
        return None;
    }

    let ac = autocorrelation(onset, max_lag);
    let mut best: Option<(usize, f64)> = None;
    for (lag, &value) in ac.iter().enumerate().take(max_lag + 1).skip(min_lag) {
        let bpm = 60.0 * frame_rate / lag as f64;
        let octaves = (bpm / PRIOR_BPM).log2() / PRIOR_OCTAVES;
        let weighted = value * (-0.5 * octaves * octaves).exp();
        if weighted > 0.0 && best.map_or(true, |(_, b)| weighted > b) {
            best = Some((lag, weighted));
        }
    }

    best.map(|(lag, _)| 60.0 * frame_rate / lag as f64)
}

/// Dynamic-programming beat tracker.
///
/// Each frame's cumulative score is its local onset score plus the best predecessor
/// score, penalized by the squared log-ratio of the gap to the tempo period. The last
/// beat is the final local maximum of the cumulative score above half its median
/// local-maximum value; beats are recovered by following back-links and weak beats at
/// either end are trimmed.
fn track_beats(
    onset: &[f64],
    frame_rate: f64,
    bpm: f64,
    cancel: &CancelToken,
) -> Result<Vec<usize>> {
    let n = onset.len();
    let std = population_std(onset);
    if n == 0 || std.is_nan() || std <= 0.0 {
        return Ok(Vec::new());
    }

    let period = (60.0 * frame_rate / bpm).round().max(1.0);
    let normalized: Vec<f64> = onset.iter().map(|v| v / std).collect();
    let local = local_score(&normalized, period);

    // Candidate predecessor offsets: -2·period ..= -period/2
    let first = -2 * period as i64;
    let last = -((period / 2.0).round() as i64);
    let offsets: Vec<i64> = (first..=last.min(-1)).collect();
    let transition: Vec<f64> = offsets
        .iter()
        .map(|&o| -TIGHTNESS * ((-o as f64) / period).ln().powi(2))
        .collect();

    let threshold = 0.01 * local.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let mut cumulative = vec![0.0; n];
    let mut backlink = vec![-1i64; n];
    let mut first_beat = true;

    for i in 0..n {
        if i % BEAT_CANCEL_INTERVAL == 0 {
            cancel.check()?;
        }
        let mut best_offset = offsets[0];
        let mut best_score = f64::NEG_INFINITY;
        for (&offset, &weight) in offsets.iter().zip(&transition) {
            let idx = i as i64 + offset;
            let previous = if idx >= 0 { cumulative[idx as usize] } else { 0.0 };
            let candidate = weight + previous;
            if candidate > best_score {
                best_score = candidate;
                best_offset = offset;
            }
        }
        cumulative[i] = local[i] + best_score;
        if first_beat && local[i] < threshold {
            backlink[i] = -1;
        } else {
            backlink[i] = i as i64 + best_offset;
            first_beat = false;
        }
    }

    let Some(tail) = last_beat(&cumulative) else {
        return Ok(Vec::new());
    };
    let mut beats = vec![tail];
    let mut cursor = backlink[tail];
    while cursor >= 0 {
        let frame = cursor as usize;
        beats.push(frame);
        cursor = backlink[frame];
    }
    beats.reverse();

    Ok(trim_beats(&local, beats))
}

/// Onset envelope smoothed by a Gaussian spanning one period either side
fn local_score(onset: &[f64], period: f64) -> Vec<f64> {
    let half = period as i64;
    let kernel: Vec<f64> = (-half..=half)
        .map(|k| {
            let x = k as f64 * 32.0 / period;
            (-0.5 * x * x).exp()
        })
        .collect();
    convolve_same(onset, &kernel)
}

fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len() as i64;
    let centre = (kernel.len() / 2) as i64;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| {
                    let j = i + centre - k as i64;
                    (0..n).contains(&j).then(|| w * signal[j as usize])
                })
                .sum()
        })
        .collect()
}

fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let n = cumulative.len();
    let is_peak = |i: usize| {
        let left = if i == 0 { true } else { cumulative[i] > cumulative[i - 1] };
        let right = if i + 1 == n { true } else { cumulative[i] >= cumulative[i + 1] };
        left && right
    };
    let mut peaks: Vec<f64> = (0..n).filter(|&i| is_peak(i)).map(|i| cumulative[i]).collect();
    if peaks.is_empty() {
        return None;
    }
    peaks.sort_by(|a, b| a.total_cmp(b));
    let median = percentile_sorted(&peaks, 50.0);
    (0..n)
        .rev()
        .find(|&i| is_peak(i) && cumulative[i] > 0.5 * median)
}

/// Drop leading and trailing beats whose smoothed local score is under half the beat RMS
fn trim_beats(local: &[f64], beats: Vec<usize>) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let smooth = convolve_same(local, &[0.0, 0.5, 1.0, 0.5, 0.0]);
    let rms = (beats.iter().map(|&b| smooth[b] * smooth[b]).sum::<f64>() / beats.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let start = beats.iter().position(|&b| smooth[b] > threshold);
    let end = beats.iter().rposition(|&b| smooth[b] > threshold);
    match (start, end) {
        (Some(s), Some(e)) => beats[s..=e].to_vec(),
        _ => Vec::new(),
    }
}

impl Detector for TemporalDetector {
    fn stage(&self) -> Stage {
        Stage::Temporal
    }

    fn metric_keys(&self) -> &'static [&'static str] {
        TEMPORAL_KEYS
    }

    fn detect(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<DetectorResult> {
        Ok(self
            .analyze(input.mono, input.sample_rate(), cancel)?
            .to_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Short decaying noise bursts every `spacing` samples
    fn click_track(sr: u32, secs: f64, spacing: usize) -> Vec<f64> {
        let n = (sr as f64 * secs) as usize;
        let mut state = 12345u32;
        (0..n)
            .map(|i| {
                let offset = i % spacing;
                if offset < 400 {
                    state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                    let noise = ((state >> 16) as f64 / 32768.0) - 1.0;
                    noise * (-(offset as f64) / 80.0).exp()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn test_click_track_tempo_and_beats() {
        let sr = 22050;
        // One click every 21 hops: 60 / (21 * 512 / 22050) ~ 123 BPM
        let spacing = 21 * 512;
        let signal = click_track(sr, 8.0, spacing);
        let analysis = TemporalDetector::default()
            .analyze(&signal, sr, &CancelToken::new())
            .unwrap();

        let expected_bpm = 60.0 * sr as f64 / spacing as f64;
        assert!(
            (analysis.tempo_bpm - expected_bpm).abs() < 3.0,
            "tempo {}",
            analysis.tempo_bpm
        );
        assert!(analysis.beat_times.len() >= 10, "beats {}", analysis.beat_times.len());
        let expected_interval = spacing as f64 / sr as f64;
        assert!((analysis.intervals.median - expected_interval).abs() < 0.03);
    }

    #[test]
    fn test_silence_has_no_beats() {
        let analysis = TemporalDetector::default()
            .analyze(&vec![0.0; 22050], 22050, &CancelToken::new())
            .unwrap();
        assert_eq!(analysis.tempo_bpm, 0.0);
        assert!(analysis.beat_times.is_empty());
        assert!(analysis.intervals.is_empty());

        let result = analysis.to_result();
        assert_eq!(result.get("beat_count"), Some(0.0));
        assert!(result.get("beat_interval_std").unwrap().is_nan());
        assert_eq!(result.len(), TEMPORAL_KEYS.len());
    }

    #[test]
    fn test_zcr_of_alternating_signal() {
        let signal: Vec<f64> = (0..4096).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let analysis = TemporalDetector::default()
            .analyze(&signal, 8000, &CancelToken::new())
            .unwrap();
        assert!((analysis.zcr.mean - 1.0).abs() < 1e-12);
        assert_eq!(analysis.zcr.std, 0.0);
    }

    #[test]
    fn test_tempo_prior_picks_fundamental_period() {
        let frame_rate = 43.0;
        // Impulses every 21 frames ~ 123 BPM; the 42-frame multiple must lose to the prior
        let onset: Vec<f64> = (0..430).map(|i| if i % 21 == 0 { 1.0 } else { 0.0 }).collect();
        let tempo = estimate_tempo(&onset, frame_rate).unwrap();
        assert!((tempo - 60.0 * frame_rate / 21.0).abs() < 1e-9, "tempo {}", tempo);
        assert!(estimate_tempo(&[0.0; 100], frame_rate).is_none());
    }

    #[test]
    fn test_cancelled_tracking() {
        let token = CancelToken::new();
        token.cancel();
        let onset: Vec<f64> = (0..600).map(|i| ((i % 20) == 0) as u8 as f64).collect();
        assert!(track_beats(&onset, 43.0, 120.0, &token).is_err());
    }
}
