// src/core/pipeline.rs
//
// Pipeline orchestration: spectral engine and the six detectors fan out over the
// same read-only buffer, then the anomaly scorer runs on the spectral summary.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::analysis::{
    default_detectors, AnomalyScorer, Detector, DetectorInput, SpectralEngine, SpectralFeatures,
};
use super::audio::AudioBuffer;
use super::cancel::CancelToken;
use super::decoder::{load_with_options, LoadOptions};
use crate::config::{AnalysisConfig, Stage};
use crate::detection::{AnalysisResult, DetectorResult, ResultValue};
use crate::error::{ForensicError, Result};

/// Independent stages that can run at once: the spectral engine plus six detectors
pub const STAGE_WORKERS: usize = 7;

/// Stateless sequencer over one buffer
pub struct Pipeline {
    config: AnalysisConfig,
    engine: SpectralEngine,
    detectors: Vec<Box<dyn Detector>>,
    scorer: Box<dyn AnomalyScorer>,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_detectors(config, default_detectors())
    }

    /// Pipeline with a custom detector set
    pub fn with_detectors(config: AnalysisConfig, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            engine: SpectralEngine::new(config.spectral.clone()),
            scorer: config.scorer.build(),
            detectors,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run with a token armed from the configured timeout
    pub fn run(&self, buffer: &AudioBuffer) -> Result<AnalysisResult> {
        let cancel = match self.config.timeout() {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };
        self.run_with_cancel(buffer, &cancel)
    }

    pub fn run_with_cancel(
        &self,
        buffer: &AudioBuffer,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        if buffer.is_empty() {
            return Err(ForensicError::computation("audio buffer holds no samples"));
        }
        let start = Instant::now();
        let mono = buffer.downmix();
        let input = DetectorInput::new(buffer, &mono);
        info!(
            "Analyzing {} samples x {} channel(s) at {} Hz ({} mode)",
            buffer.frame_count(),
            buffer.channel_count(),
            buffer.sample_rate(),
            if self.config.parallel { "parallel" } else { "sequential" }
        );

        let (spectral, detections) = if self.config.parallel {
            self.run_parallel(&input, cancel)?
        } else {
            self.run_sequential(&input, cancel)
        };
        let features = spectral?;
        let detections = detections.into_iter().collect::<Result<Vec<_>>>()?;
        cancel.check()?;

        let observation = features.feature_vector();
        debug!("Anomaly scoring over {} features ({})", observation.len(), self.scorer.name());
        let anomaly = self
            .scorer
            .score_result(std::slice::from_ref(&observation))?;

        let result = self.assemble(buffer, &features, detections, anomaly);
        info!("Analysis finished in {:.2?}", start.elapsed());
        Ok(result)
    }

    fn run_parallel(
        &self,
        input: &DetectorInput,
        cancel: &CancelToken,
    ) -> Result<(Result<SpectralFeatures>, Vec<Result<DetectorResult>>)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(STAGE_WORKERS)
            .build()
            .map_err(|e| ForensicError::computation(format!("failed to build worker pool: {}", e)))?;

        Ok(pool.install(|| {
            rayon::join(
                || self.run_spectral(input, cancel),
                || {
                    self.detectors
                        .par_iter()
                        .map(|d| run_isolated(d.as_ref(), input, cancel))
                        .collect()
                },
            )
        }))
    }

    fn run_sequential(
        &self,
        input: &DetectorInput,
        cancel: &CancelToken,
    ) -> (Result<SpectralFeatures>, Vec<Result<DetectorResult>>) {
        let spectral = self.run_spectral(input, cancel);
        let detections = self
            .detectors
            .iter()
            .map(|d| run_isolated(d.as_ref(), input, cancel))
            .collect();
        (spectral, detections)
    }

    fn run_spectral(&self, input: &DetectorInput, cancel: &CancelToken) -> Result<SpectralFeatures> {
        self.engine.compute(input.mono, input.sample_rate(), cancel)
    }

    fn assemble(
        &self,
        buffer: &AudioBuffer,
        features: &SpectralFeatures,
        detections: Vec<DetectorResult>,
        anomaly: DetectorResult,
    ) -> AnalysisResult {
        let mut result = AnalysisResult::new();
        result.insert("metadata", metadata(buffer));
        result.insert_stage(
            Stage::Spectral,
            features.to_result_value(self.config.include_matrices),
        );
        for (detector, detection) in self.detectors.iter().zip(detections) {
            result.insert_stage(detector.stage(), detection);
        }
        result.insert_stage(Stage::Anomaly, anomaly);
        result
    }
}

fn metadata(buffer: &AudioBuffer) -> ResultValue {
    let mut node = ResultValue::map();
    node.insert("sample_rate", buffer.sample_rate() as f64);
    node.insert("duration_seconds", buffer.duration_secs());
    node.insert("channels", buffer.channel_count() as f64);
    node.insert("sample_count", buffer.frame_count() as f64);
    node
}

/// Run one detector, turning errors and panics into a failed placeholder.
/// Cancellation is the one error that still propagates.
fn run_isolated(
    detector: &dyn Detector,
    input: &DetectorInput,
    cancel: &CancelToken,
) -> Result<DetectorResult> {
    let stage = detector.stage().name();
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| detector.detect(input, cancel)));

    match outcome {
        Ok(Ok(result)) => {
            debug!("Stage {} finished in {:.2?}", stage, start.elapsed());
            Ok(result)
        }
        Ok(Err(e)) if e.is_cancellation() => Err(e),
        Ok(Err(e)) => {
            warn!("Stage {} failed, reporting placeholder: {}", stage, e);
            Ok(DetectorResult::failed(detector.metric_keys()))
        }
        Err(payload) => {
            warn!(
                "Stage {} panicked, reporting placeholder: {}",
                stage,
                panic_message(payload.as_ref())
            );
            Ok(DetectorResult::failed(detector.metric_keys()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ingest a file and run the pipeline over it
pub fn analyze_file(
    path: &Path,
    options: &LoadOptions,
    config: &AnalysisConfig,
) -> Result<(AudioBuffer, AnalysisResult)> {
    let buffer = load_with_options(path, options)?;
    let result = Pipeline::new(config.clone()).run(&buffer)?;
    Ok((buffer, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    struct Exploding;

    impl Detector for Exploding {
        fn stage(&self) -> Stage {
            Stage::Watermark
        }

        fn metric_keys(&self) -> &'static [&'static str] {
            &["boom"]
        }

        fn detect(&self, _: &DetectorInput, _: &CancelToken) -> Result<DetectorResult> {
            panic!("detector exploded")
        }
    }

    fn tone() -> AudioBuffer {
        let samples = (0..8000)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f64 / 8000.0).sin())
            .collect();
        AudioBuffer::mono(samples, 8000).unwrap()
    }

    #[test]
    fn test_panicking_detector_is_isolated() {
        let config = AnalysisConfig::builder().parallel(false).build();
        let pipeline = Pipeline::with_detectors(config, vec![Box::new(Exploding)]);
        let result = pipeline.run(&tone()).unwrap();

        let watermark = result.stage(Stage::Watermark).unwrap();
        assert!(watermark.get("boom").and_then(|v| v.as_scalar()).unwrap().is_nan());
        assert_eq!(
            watermark.get("stage_failed").and_then(|v| v.as_scalar()),
            Some(1.0)
        );
        assert!(result.stage(Stage::Anomaly).is_some());
    }

    #[test]
    fn test_empty_buffer_is_rejected() {
        let buffer = AudioBuffer::mono(Vec::new(), 8000).unwrap();
        let err = Pipeline::new(AnalysisConfig::default()).run(&buffer).unwrap_err();
        assert!(matches!(err, ForensicError::Computation(_)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("bad");
        assert_eq!(panic_message(payload.as_ref()), "bad");
        let payload: Box<dyn Any + Send> = Box::new(String::from("worse"));
        assert_eq!(panic_message(payload.as_ref()), "worse");
    }
}
