//! Shared HTTP plumbing for the remote model clients.

use std::time::Duration;

use patentrag_core::{GenerationError, ServiceError};
use serde::de::DeserializeOwned;
use tracing::warn;

/// HTTP status the model server uses when a generation cannot be allocated.
pub const STATUS_INSUFFICIENT_STORAGE: u16 = 507;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::NotConfigured(format!("failed to create HTTP client: {e}")))
}

pub(crate) fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(err.to_string())
    } else {
        ServiceError::Network(err.to_string())
    }
}

/// Map a non-success status and body to a [`ServiceError`].
pub(crate) fn status_error(status: u16, body: String) -> ServiceError {
    match status {
        429 | 503 => ServiceError::Unavailable(body),
        _ => ServiceError::Api {
            status_code: status,
            message: body,
        },
    }
}

/// Send a request and decode a JSON body, mapping every failure mode.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ServiceError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status().as_u16();

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "Remote service returned error");
        return Err(status_error(status, body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::MalformedResponse(format!("failed to parse response: {e}")))
}

/// Translate a transport failure during generation into the generation taxonomy.
pub(crate) fn generation_error(model: &str, err: ServiceError, timeout: Duration) -> GenerationError {
    match err {
        ServiceError::Api { status_code, .. } if status_code == STATUS_INSUFFICIENT_STORAGE => {
            GenerationError::ResourceExhausted {
                model: model.to_string(),
            }
        }
        ServiceError::Timeout(_) => GenerationError::Timeout {
            model: model.to_string(),
            after_secs: timeout.as_secs(),
        },
        ServiceError::Unavailable(_) | ServiceError::Network(_) => {
            GenerationError::ModelUnavailable(model.to_string())
        }
        other => GenerationError::Backend {
            model: model.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_unavailable_maps_to_unavailable() {
        assert!(matches!(
            status_error(503, "model not loaded".into()),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(429, "rate limited".into()),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(500, "boom".into()),
            ServiceError::Api { status_code: 500, .. }
        ));
    }

    #[test]
    fn insufficient_storage_is_resource_exhausted() {
        let err = generation_error(
            "sllm",
            status_error(507, "CUDA out of memory".into()),
            Duration::from_secs(120),
        );
        assert!(matches!(err, GenerationError::ResourceExhausted { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn timeout_keeps_configured_duration() {
        let err = generation_error(
            "base_model",
            ServiceError::Timeout("deadline".into()),
            Duration::from_secs(120),
        );
        assert!(matches!(
            err,
            GenerationError::Timeout { after_secs: 120, .. }
        ));
    }

    #[test]
    fn unavailable_and_network_mean_model_unavailable() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            generation_error("m", ServiceError::Unavailable(String::new()), timeout),
            GenerationError::ModelUnavailable(_)
        ));
        assert!(matches!(
            generation_error("m", ServiceError::Network("refused".into()), timeout),
            GenerationError::ModelUnavailable(_)
        ));
    }

    #[test]
    fn other_failures_are_backend_errors() {
        let err = generation_error(
            "m",
            ServiceError::MalformedResponse("no response field".into()),
            Duration::from_secs(1),
        );
        assert!(matches!(err, GenerationError::Backend { .. }));
        assert!(!err.is_retryable());
    }
}
