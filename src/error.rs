//! Error types for FrequenCipher
//!
//! Error strategy:
//! - Ingestion errors (missing file, unsupported format, empty decode): abort the run
//! - Computation errors (invalid pipeline preconditions): abort the run
//! - Detector-local numeric degeneracies are never errors; detectors report sentinels
//!
//! A detector that fails internally is isolated by the pipeline and reported as a
//! failed stage, so its siblings still produce results.

use std::path::PathBuf;
use thiserror::Error;

/// Formats accepted by the ingestion stage
pub const SUPPORTED_FORMATS: &[&str] = &["wav", "flac", "mp3", "ogg"];

/// Errors raised while turning a file on disk into an [`AudioBuffer`](crate::core::AudioBuffer)
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Audio file not found: '{0}'")]
    NotFound(PathBuf),

    #[error("Unsupported audio format for '{path}': {extension}\n  Supported formats: wav, flac, mp3, ogg")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("No audio samples decoded from '{0}'")]
    Empty(PathBuf),

    #[error("Failed to decode audio file '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Resampling to {target} Hz failed: {reason}")]
    Resample { target: u32, reason: String },
}

impl IngestionError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IngestionError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Top-level error type for analysis runs
#[derive(Debug, Error)]
pub enum ForensicError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// A pipeline precondition was violated (empty buffer, empty feature vector, ...)
    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Analysis cancelled before completion")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForensicError {
    pub fn computation(reason: impl Into<String>) -> Self {
        ForensicError::Computation(reason.into())
    }

    /// Returns true if the run was aborted by a cancellation signal or timeout
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ForensicError::Cancelled)
    }
}

/// Result type alias for FrequenCipher operations
pub type Result<T> = std::result::Result<T, ForensicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_error_converts() {
        let err: ForensicError = IngestionError::NotFound(PathBuf::from("missing.wav")).into();
        assert!(matches!(err, ForensicError::Ingestion(IngestionError::NotFound(_))));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn test_cancellation_flag() {
        assert!(ForensicError::Cancelled.is_cancellation());
        assert!(!ForensicError::computation("empty").is_cancellation());
    }
}
