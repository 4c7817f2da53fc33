//! Pipeline-level errors.
//!
//! Retrieval and classification failures are recovered inside the pipeline
//! and never reach this type. What remains is surfaced to the caller.

use patentrag_core::GenerationError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Request exceeded its deadline after {after_ms}ms")]
    DeadlineExceeded { after_ms: u64 },

    #[error("Query is empty")]
    EmptyQuery,
}

impl PipelineError {
    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(e) => e.is_retryable(),
            Self::DeadlineExceeded { .. } => true,
            Self::EmptyQuery => false,
        }
    }

    /// Short failure text shown to the end user instead of an answer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Generation(GenerationError::ResourceExhausted { .. }) => {
                "요청이 너무 깁니다. 더 짧은 질문으로 다시 시도해 주세요."
            }
            Self::Generation(GenerationError::Timeout { .. }) | Self::DeadlineExceeded { .. } => {
                "응답 생성 시간이 초과되었습니다. 잠시 후 다시 시도해 주세요."
            }
            Self::Generation(GenerationError::ModelUnavailable(_)) => {
                "현재 답변 모델을 사용할 수 없습니다. 잠시 후 다시 시도해 주세요."
            }
            Self::Generation(GenerationError::Backend { .. }) => {
                "답변을 생성하지 못했습니다. 잠시 후 다시 시도해 주세요."
            }
            Self::EmptyQuery => "질문을 입력해 주세요.",
        }
    }
}
