//! Error types for the patent RAG domain.
//!
//! One `thiserror` enum per bounded context. Each crate surfaces the enum
//! of its own context; the pipeline decides which of them degrade and which
//! reach the caller.

use thiserror::Error;

/// Transport-level failure talking to a remote model service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

/// The `RetrievalUnavailable` family: the backing index could not answer.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval backend '{backend}' unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("top_k must be a positive integer")]
    InvalidTopK,
}

impl RetrievalError {
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

/// The `ClassificationUnavailable` family.
#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier returned an unusable response: {0}")]
    MalformedResponse(String),
}

impl From<ServiceError> for ClassificationError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MalformedResponse(m) => Self::MalformedResponse(m),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// The `GenerationFailed` family.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Model '{model}' could not allocate the requested generation")]
    ResourceExhausted { model: String },

    #[error("Model '{model}' timed out after {after_secs}s")]
    Timeout { model: String, after_secs: u64 },

    #[error("Model '{0}' is unavailable")]
    ModelUnavailable(String),

    #[error("Model '{model}' failed: {reason}")]
    Backend { model: String, reason: String },
}

impl GenerationError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResourceExhausted { .. } | Self::Timeout { .. } | Self::ModelUnavailable(_)
        )
    }
}

/// Non-fatal post-processing findings, surfaced in response metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    #[error("Answer cites {label}, which is not in the citation mapping")]
    OrphanCitation { label: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_displays_correctly() {
        let err = ServiceError::Api {
            status_code: 503,
            message: "model not loaded".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn retrieval_unavailable_names_backend() {
        let err = RetrievalError::unavailable("postgres", "connection refused");
        assert!(err.to_string().contains("postgres"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn service_errors_map_to_classification_unavailable() {
        let err: ClassificationError = ServiceError::Timeout("30s".into()).into();
        assert!(matches!(err, ClassificationError::Unavailable(_)));

        let err: ClassificationError = ServiceError::MalformedResponse("no label".into()).into();
        assert!(matches!(err, ClassificationError::MalformedResponse(_)));
    }

    #[test]
    fn generation_retryability() {
        assert!(GenerationError::ResourceExhausted { model: "m".into() }.is_retryable());
        assert!(
            GenerationError::Timeout {
                model: "m".into(),
                after_secs: 120
            }
            .is_retryable()
        );
        assert!(
            !GenerationError::Backend {
                model: "m".into(),
                reason: "bad prompt".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn orphan_citation_serializes_with_kind() {
        let warning = ValidationWarning::OrphanCitation {
            label: "CITATION_4".into(),
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("orphan_citation"));
        assert!(json.contains("CITATION_4"));
    }
}
