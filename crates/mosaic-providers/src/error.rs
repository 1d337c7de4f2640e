//! Error types for provider clients and completions.

use mosaic_core::{ConfigError, UnsupportedProvider};

/// Result type alias for provider operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Errors surfaced to callers of the factory and invoker.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Required credential or endpoint missing/invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A request reached the traced transport without `x-correlation-id`.
    /// Integration bug; never retried.
    #[error("request is missing the x-correlation-id header")]
    MissingCorrelationId,

    /// Provider name outside the supported set.
    #[error(transparent)]
    UnsupportedProvider(#[from] UnsupportedProvider),

    /// The structured-output loop used up its attempt budget.
    #[error("completion failed after {attempts} attempt(s): {last_failure}")]
    CompletionRetryExhausted {
        attempts: u32,
        last_failure: AttemptFailure,
    },

    /// Network failure from the underlying HTTP client, passed through.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request body could not be built.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LlmError {
    /// Whether issuing the same call again could succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transport(_))
    }

    /// The last attempt failure, for exhausted completions.
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        match self {
            LlmError::CompletionRetryExhausted { last_failure, .. } => Some(last_failure),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

/// Why one structured-completion attempt was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// The backend answered with a non-2xx status.
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    /// The response had no structured payload where the mode expects one.
    #[error("no structured output in response: {0}")]
    MissingOutput(String),

    /// The payload did not deserialize into the response schema.
    #[error("response failed validation: {0}")]
    Validation(String),
}
