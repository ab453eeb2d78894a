//! Domain errors for the scoring core.

use thiserror::Error;

/// Errors raised inside the scoring core.
///
/// None of these escape the pipeline: engines convert them into degraded
/// outcomes with neutral defaults, and the resilience layer converts them
/// into structured failure results.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Rule registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Knowledge core unavailable: {0}")]
    KnowledgeUnavailable(String),

    #[error("External call '{api}' timed out after {timeout_ms}ms")]
    Timeout { api: String, timeout_ms: u64 },

    #[error("Circuit open for '{api}', call rejected without attempt")]
    CircuitOpen { api: String },

    #[error("External call failed: {0}")]
    External(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result alias used throughout the domain layer.
pub type ScoreResult<T> = Result<T, ScoreError>;

impl From<serde_json::Error> for ScoreError {
    fn from(err: serde_json::Error) -> Self {
        ScoreError::Serialization(err.to_string())
    }
}
