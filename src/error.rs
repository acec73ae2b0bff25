//! Error types for the extraction pipeline.
//!
//! Call-level failures (`ExtractError`) abort one extraction. Field-level
//! failures (`RecognitionError`) only blank the affected field. `ConfigError`
//! is raised once at startup.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum RecognitionError {
    #[error("backend error: {message}")]
    Backend { message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("recognition timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
    #[error("failed to encode region: {message}")]
    Encode { message: String },
}

impl RecognitionError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },
    #[error("recognition backend unavailable: {}", failures.join("; "))]
    BackendUnavailable { failures: Vec<String> },
}

impl ExtractError {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is not a valid YYYY-MM-DD date: {value:?}")]
    InvalidDate { field: &'static str, value: String },
    #[error("event window starts after it ends ({start} > {end})")]
    InvertedWindow { start: String, end: String },
    #[error("region {field} is invalid: {reason}")]
    InvalidRegion { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_lists_every_failure() {
        let err = ExtractError::BackendUnavailable {
            failures: vec!["date: boom".to_string(), "score: boom".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "recognition backend unavailable: date: boom; score: boom"
        );
    }

    #[test]
    fn test_recognition_error_helpers() {
        assert!(matches!(
            RecognitionError::backend("quota"),
            RecognitionError::Backend { .. }
        ));
        assert_eq!(
            RecognitionError::Timeout { after_ms: 500 }.to_string(),
            "recognition timed out after 500 ms"
        );
    }
}
