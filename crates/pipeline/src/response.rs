//! Pipeline output: the validated answer plus everything that explains it.

use chrono::{DateTime, Utc};
use patentrag_core::{
    CitationMapping, ClassificationResult, MemoryContext, ModelId, OutcomeLabel,
    ValidationWarning,
};
use patentrag_retrieval::RetrievalOutcome;
use serde::Serialize;
use uuid::Uuid;

/// A finished request.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub answer: String,
    pub metadata: ResponseMetadata,
}

/// How the answer was produced. Every fallback taken is flagged here.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Route the Model Router chose.
    pub route: OutcomeLabel,
    /// Model that produced the answer.
    pub model: ModelId,
    /// Models considered for the route, in order.
    pub models_tried: Vec<ModelId>,
    pub model_fallback: bool,
    pub retrieval: RetrievalSummary,
    /// `None` when there was nothing to classify or the classifier failed.
    pub classification: Option<ClassificationResult>,
    pub classification_fallback: bool,
    pub citations: CitationMapping,
    pub memory: MemoryContext,
    pub warnings: Vec<ValidationWarning>,
    /// Estimated, see [`crate::context::token`].
    pub prompt_tokens: usize,
    pub elapsed_ms: u64,
}

/// Retrieval part of [`ResponseMetadata`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalSummary {
    pub backend_used: Option<String>,
    pub attempted: Vec<String>,
    pub fallback_used: bool,
    /// Every backend failed, or the query could not be embedded.
    pub degraded: bool,
    pub hits: usize,
}

impl RetrievalSummary {
    pub fn from_outcome(outcome: &RetrievalOutcome) -> Self {
        Self {
            backend_used: outcome.backend_used.clone(),
            attempted: outcome.attempted.clone(),
            fallback_used: outcome.fallback_used,
            degraded: outcome.is_degraded(),
            hits: outcome.hits.len(),
        }
    }

    /// Summary for a query whose embedding failed before any backend ran.
    pub fn embedding_failed() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }
}

impl ResponseMetadata {
    /// Whether any fallback was taken along the way.
    pub fn any_fallback(&self) -> bool {
        self.model_fallback
            || self.classification_fallback
            || self.retrieval.fallback_used
            || self.retrieval.degraded
    }
}
