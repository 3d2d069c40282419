//! Result types produced by the analysis pipeline

mod result;

pub use result::{AnalysisResult, DetectorResult, ResultValue, STAGE_FAILED_KEY};
