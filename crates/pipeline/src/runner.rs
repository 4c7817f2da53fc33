//! The request pipeline.
//!
//! # Flow
//!
//! 1. Validate the query and bound it for embedding
//! 2. Embed the query and search the retriever chain
//! 3. Classify the top-ranked hit (only rank 1)
//! 4. Extract memory from the windowed history
//! 5. Compose the prompt with a fresh citation mapping
//! 6. Route on the classification and generate
//! 7. Validate the raw output
//!
//! Retrieval and classification failures degrade (no documents, and the
//! registration route respectively) and are flagged in the metadata.
//! Generation failures are returned to the caller. The whole run is bounded
//! by a request deadline; when it elapses the in-flight work is dropped and
//! nothing partial is returned.
//!
//! The pipeline holds no per-request state, so one instance serves
//! concurrent requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use patentrag_config::AppConfig;
use patentrag_core::conversation::recent_window;
use patentrag_core::{
    CitationMapping, ClassificationResult, ConversationTurn, Embedder, OutcomeClassifier,
    RetrievedHit,
};
use patentrag_providers::{ModelRouter, RemoteServices, Routed};
use patentrag_retrieval::RetrieverChain;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::token::estimate_prompt_tokens;
use crate::context::{MemoryExtractor, PromptComposer, truncate_chars};
use crate::error::PipelineError;
use crate::response::{PipelineResponse, ResponseMetadata, RetrievalSummary};
use crate::validator::ResponseValidator;

/// End-to-end question answering over the injected services.
pub struct PatentPipeline {
    embedder: Arc<dyn Embedder>,
    retrievers: RetrieverChain,
    classifier: Arc<dyn OutcomeClassifier>,
    router: ModelRouter,
    extractor: MemoryExtractor,
    composer: PromptComposer,
    validator: ResponseValidator,
    top_k: usize,
    history_window: usize,
    query_char_budget: usize,
    embed_timeout: Duration,
    classify_timeout: Duration,
    request_timeout: Duration,
}

/// Health of one collaborator, as reported by [`PatentPipeline::health`].
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub name: String,
    pub healthy: bool,
    pub detail: Option<String>,
}

impl PatentPipeline {
    /// Create a pipeline with default tuning.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retrievers: RetrieverChain,
        classifier: Arc<dyn OutcomeClassifier>,
        router: ModelRouter,
    ) -> Self {
        Self {
            embedder,
            retrievers,
            classifier,
            router,
            extractor: MemoryExtractor::new(),
            composer: PromptComposer::new(),
            validator: ResponseValidator::new(),
            top_k: 3,
            history_window: 10,
            query_char_budget: 2000,
            embed_timeout: Duration::from_secs(30),
            classify_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(180),
        }
    }

    /// Wire a pipeline from configuration and already-built services.
    pub fn from_config(
        config: &AppConfig,
        services: RemoteServices,
        retrievers: RetrieverChain,
    ) -> Self {
        Self::new(
            services.embedder,
            retrievers,
            services.classifier,
            services.router,
        )
        .with_top_k(config.retrieval.top_k)
        .with_history_window(config.memory.history_window)
        .with_query_char_budget(config.prompt.query_char_budget)
        .with_extractor(MemoryExtractor::new().with_max_facts(config.memory.max_facts))
        .with_composer(PromptComposer::new().with_doc_char_budget(config.prompt.doc_char_budget))
        .with_embed_timeout(Duration::from_secs(config.pipeline.embed_timeout_secs))
        .with_classify_timeout(Duration::from_secs(config.pipeline.classify_timeout_secs))
        .with_request_timeout(Duration::from_secs(config.pipeline.request_timeout_secs))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Number of trailing turns handed to the memory extractor.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Characters of query text sent to the embedder.
    pub fn with_query_char_budget(mut self, budget: usize) -> Self {
        self.query_char_budget = budget;
        self
    }

    pub fn with_extractor(mut self, extractor: MemoryExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// Deadline for a whole request, generation included.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Answer `query` in the context of `history`.
    pub async fn answer(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<PipelineResponse, PipelineError> {
        let started = Instant::now();
        match tokio::time::timeout(self.request_timeout, self.run(query, history, started)).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = started.elapsed().as_millis() as u64;
                warn!(after_ms, "Pipeline: request deadline exceeded, abandoning");
                Err(PipelineError::DeadlineExceeded { after_ms })
            }
        }
    }

    async fn run(
        &self,
        query: &str,
        history: &[ConversationTurn],
        started: Instant,
    ) -> Result<PipelineResponse, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let request_id = Uuid::new_v4();
        info!(%request_id, query_chars = query.chars().count(), history = history.len(), "Pipeline: request started");

        // ── Step 1-2: embed + retrieve ──
        let (hits, retrieval) = self.retrieve(query).await;

        // ── Step 3: classify the top hit ──
        let (classification, classification_fallback) = self.classify_top(hits.first()).await;

        // ── Step 4: memory ──
        let window = recent_window(history, self.history_window);
        let memory = self.extractor.extract(&window);

        // ── Step 5: prompt ──
        let citations = CitationMapping::from_hits(&hits);
        let prompt = self.composer.compose(
            query,
            &hits,
            classification.as_ref(),
            &memory,
            &citations,
        );
        let prompt_tokens = estimate_prompt_tokens(&prompt);

        // ── Step 6: route + generate ──
        debug!(%request_id, prompt_tokens, "Pipeline: generating");
        let Routed { decision, text: raw } = self
            .router
            .generate(classification.as_ref(), &prompt)
            .await
            .inspect_err(|e| warn!(%request_id, error = %e, "Pipeline: generation failed"))?;
        info!(
            %request_id,
            route = %decision.route,
            model = %decision.model_id(),
            fallback = decision.fallback_used,
            "Pipeline: generated"
        );

        // ── Step 7: validate ──
        let validated = self
            .validator
            .finalize(&raw, classification.as_ref(), &citations);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            %request_id,
            route = %decision.route,
            warnings = validated.warnings.len(),
            elapsed_ms,
            "Pipeline: request finished"
        );

        Ok(PipelineResponse {
            answer: validated.text,
            metadata: ResponseMetadata {
                request_id,
                created_at: chrono::Utc::now(),
                route: decision.route,
                model: decision.model_id().clone(),
                models_tried: decision.tried.clone(),
                model_fallback: decision.fallback_used,
                retrieval,
                classification,
                classification_fallback,
                citations,
                memory,
                warnings: validated.warnings,
                prompt_tokens,
                elapsed_ms,
            },
        })
    }

    /// Embed and search. Never fails: any error means no documents.
    async fn retrieve(&self, query: &str) -> (Vec<RetrievedHit>, RetrievalSummary) {
        let bounded = truncate_chars(query, self.query_char_budget);
        let call = self.embedder.embed(&bounded);
        let vector = match tokio::time::timeout(self.embed_timeout, call).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                warn!(embedder = %self.embedder.name(), error = %e, "Pipeline: embedding failed, continuing without documents");
                return (Vec::new(), RetrievalSummary::embedding_failed());
            }
            Err(_) => {
                warn!(
                    embedder = %self.embedder.name(),
                    timeout_secs = self.embed_timeout.as_secs(),
                    "Pipeline: embedding timed out, continuing without documents"
                );
                return (Vec::new(), RetrievalSummary::embedding_failed());
            }
        };

        let outcome = self.retrievers.retrieve(&vector, self.top_k).await;
        let summary = RetrievalSummary::from_outcome(&outcome);
        debug!(
            hits = outcome.hits.len(),
            backend = outcome.backend_used.as_deref().unwrap_or("none"),
            degraded = summary.degraded,
            "Pipeline: retrieval finished"
        );
        (outcome.hits, summary)
    }

    /// Classify the rank-1 hit. Returns the result and whether the
    /// classifier failed and the registration route is taken by fallback.
    async fn classify_top(&self, top: Option<&RetrievedHit>) -> (Option<ClassificationResult>, bool) {
        let Some(top) = top else {
            debug!("Pipeline: no documents to classify");
            return (None, false);
        };

        let call = self.classifier.classify(&top.document.text);
        match tokio::time::timeout(self.classify_timeout, call).await {
            Ok(Ok(result)) => {
                debug!(label = %result.label, confidence = result.confidence, doc_id = %top.document.doc_id, "Pipeline: classified top hit");
                (Some(result), false)
            }
            Ok(Err(e)) => {
                warn!(classifier = %self.classifier.name(), error = %e, "Pipeline: classification unavailable, using registration route");
                (None, true)
            }
            Err(_) => {
                warn!(
                    classifier = %self.classifier.name(),
                    timeout_secs = self.classify_timeout.as_secs(),
                    "Pipeline: classification timed out, using registration route"
                );
                (None, true)
            }
        }
    }

    /// Probe every collaborator.
    pub async fn health(&self) -> Vec<ComponentHealth> {
        let mut report = Vec::new();

        report.push(service_health(
            "embedder",
            self.embedder.name(),
            self.embedder.health_check().await,
        ));
        report.push(service_health(
            "classifier",
            self.classifier.name(),
            self.classifier.health_check().await,
        ));

        for (name, result) in self.retrievers.health_report().await {
            report.push(match result {
                Ok(healthy) => ComponentHealth {
                    component: "retriever",
                    name,
                    healthy,
                    detail: None,
                },
                Err(e) => ComponentHealth {
                    component: "retriever",
                    name,
                    healthy: false,
                    detail: Some(e.to_string()),
                },
            });
        }

        let generators = self.router.generators();
        let availability = join_all(generators.iter().map(|g| g.is_available())).await;
        for (generator, healthy) in generators.iter().zip(availability) {
            report.push(ComponentHealth {
                component: "generator",
                name: generator.model_id().to_string(),
                healthy,
                detail: None,
            });
        }

        report
    }
}

fn service_health<E: std::fmt::Display>(
    component: &'static str,
    name: &str,
    result: Result<bool, E>,
) -> ComponentHealth {
    match result {
        Ok(healthy) => ComponentHealth {
            component,
            name: name.to_string(),
            healthy,
            detail: None,
        },
        Err(e) => ComponentHealth {
            component,
            name: name.to_string(),
            healthy: false,
            detail: Some(e.to_string()),
        },
    }
}
