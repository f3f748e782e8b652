//! Error types for the fitcrew_core library.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fitcrew_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Job store error (unknown job, illegal state transition)
    #[error("Job error: {0}")]
    Job(String),

    /// Workout generation failed
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Pipeline stage, used to locate a generation failure
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Request,
    Planning,
    Gathering,
    Synthesis,
    Validation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Planning => "planning",
            Stage::Gathering => "gathering",
            Stage::Synthesis => "synthesis",
            Stage::Validation => "validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned to callers of `Orchestrator::generate`.
///
/// Parse failures and collaborator failures are recovered inside the
/// pipeline and never surface here.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The request was rejected before any collaborator was contacted
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required phase had no usable content after every fallback
    #[error("{stage} stage failed: {message}")]
    Structural { stage: Stage, message: String },

    /// The end-to-end budget ran out
    #[error("generation timed out after {budget_ms}ms during {stage} stage")]
    Timeout { stage: Stage, budget_ms: u64 },
}

impl GenerationError {
    /// Stage at which the failure occurred
    pub fn stage(&self) -> Stage {
        match self {
            GenerationError::InvalidRequest(_) => Stage::Request,
            GenerationError::Structural { stage, .. } => *stage,
            GenerationError::Timeout { stage, .. } => *stage,
        }
    }

    /// Human-readable reason
    pub fn message(&self) -> String {
        match self {
            GenerationError::InvalidRequest(msg) => msg.clone(),
            GenerationError::Structural { message, .. } => message.clone(),
            GenerationError::Timeout { budget_ms, .. } => {
                format!("end-to-end budget of {}ms exceeded", budget_ms)
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_error_names_stage() {
        let err = GenerationError::Structural {
            stage: Stage::Validation,
            message: "warmup phase is empty after normalization".into(),
        };
        assert_eq!(err.stage(), Stage::Validation);
        assert!(err.to_string().starts_with("validation stage failed"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_is_distinct() {
        let err = GenerationError::Timeout {
            stage: Stage::Gathering,
            budget_ms: 30_000,
        };
        assert!(err.is_timeout());
        assert_eq!(err.stage(), Stage::Gathering);
        assert!(err.message().contains("30000ms"));
    }

    #[test]
    fn test_invalid_request_is_request_stage() {
        let err = GenerationError::InvalidRequest("duration out of range".into());
        assert_eq!(err.stage(), Stage::Request);
    }
}
