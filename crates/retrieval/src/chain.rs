//! Retriever chain: ordered backends with per-backend timeouts and retries.
//!
//! Each backend is tried `1 + retries` times before moving on to the next
//! one. Which backend answered, and whether any fallback happened, is
//! reported in the [`RetrievalOutcome`] instead of being hidden.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patentrag_core::{RetrievalError, RetrievedHit, VectorRetriever};
use serde::Serialize;
use tracing::{info, warn};

/// Result of one chain search, successful or degraded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalOutcome {
    pub hits: Vec<RetrievedHit>,

    /// Backend that produced `hits`; `None` when every backend failed.
    pub backend_used: Option<String>,

    /// Backend names in the order they were attempted (repeats for retries).
    pub attempted: Vec<String>,

    /// True when the first attempt did not produce the result.
    pub fallback_used: bool,

    /// Last error seen when every backend failed.
    #[serde(skip)]
    pub error: Option<RetrievalError>,
}

impl RetrievalOutcome {
    /// Whether retrieval gave up and the caller must proceed without context.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

struct ChainEntry {
    retriever: Arc<dyn VectorRetriever>,
    timeout: Duration,
}

pub struct RetrieverChain {
    chain: Vec<ChainEntry>,
    retries: u32,
}

impl RetrieverChain {
    /// Create a chain with no backends and one retry per backend.
    pub fn new() -> Self {
        Self {
            chain: Vec::new(),
            retries: 1,
        }
    }

    /// Add a backend with a custom timeout.
    pub fn add(mut self, retriever: Arc<dyn VectorRetriever>, timeout: Duration) -> Self {
        self.chain.push(ChainEntry { retriever, timeout });
        self
    }

    /// Extra attempts per backend after its first failure.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Backend names in chain order.
    pub fn backend_names(&self) -> Vec<String> {
        self.chain
            .iter()
            .map(|e| e.retriever.name().to_string())
            .collect()
    }

    /// Search the chain, never failing: a total failure yields a degraded
    /// outcome with no hits.
    pub async fn retrieve(&self, query: &[f32], top_k: usize) -> RetrievalOutcome {
        let mut outcome = RetrievalOutcome::default();
        let mut last_error = RetrievalError::unavailable("chain", "no retrieval backends configured");

        for entry in &self.chain {
            let backend = entry.retriever.name().to_string();

            for attempt in 1..=self.retries + 1 {
                outcome.attempted.push(backend.clone());
                info!(backend = %backend, attempt, "Retrieval: trying backend");

                let result =
                    match tokio::time::timeout(entry.timeout, entry.retriever.search(query, top_k))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(RetrievalError::unavailable(
                            &backend,
                            format!("timed out after {}s", entry.timeout.as_secs()),
                        )),
                    };

                match result {
                    Ok(hits) => {
                        outcome.fallback_used = outcome.attempted.len() > 1;
                        outcome.backend_used = Some(backend);
                        outcome.hits = hits;
                        return outcome;
                    }
                    // Bad input fails the same way on every backend.
                    Err(e @ RetrievalError::InvalidTopK) => {
                        warn!(error = %e, "Retrieval: rejected query");
                        outcome.error = Some(e);
                        return outcome;
                    }
                    // Retrying cannot change the index's dimension; the
                    // next backend may still match.
                    Err(e @ RetrievalError::DimensionMismatch { .. }) => {
                        warn!(backend = %backend, error = %e, "Retrieval: dimension mismatch, skipping backend");
                        last_error = e;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            backend = %backend,
                            attempt,
                            error = %e,
                            "Retrieval: backend failed"
                        );
                        last_error = e;
                    }
                }
            }
        }

        warn!(
            attempts = outcome.attempted.len(),
            "Retrieval: all backends failed, continuing without documents"
        );
        outcome.fallback_used = outcome.attempted.len() > 1;
        outcome.error = Some(last_error);
        outcome
    }

    /// Health of every backend, in chain order.
    pub async fn health_report(&self) -> Vec<(String, Result<bool, RetrievalError>)> {
        let mut report = Vec::with_capacity(self.chain.len());
        for entry in &self.chain {
            let result =
                match tokio::time::timeout(entry.timeout, entry.retriever.health_check()).await {
                    Ok(r) => r,
                    Err(_) => Err(RetrievalError::unavailable(
                        entry.retriever.name(),
                        "health check timed out",
                    )),
                };
            report.push((entry.retriever.name().to_string(), result));
        }
        report
    }
}

impl Default for RetrieverChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRetriever for RetrieverChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedHit>, RetrievalError> {
        let outcome = self.retrieve(query, top_k).await;
        match outcome.error {
            Some(e) => Err(e),
            None => Ok(outcome.hits),
        }
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        let report = self.health_report().await;
        Ok(report.iter().any(|(_, r)| matches!(r, Ok(true))))
    }
}
