//! Process bootstrap: builds every service handle once and injects it into
//! the pipeline.

use std::sync::Arc;
use std::time::Duration;

use patentrag_config::AppConfig;
use patentrag_pipeline::PatentPipeline;
use patentrag_retrieval::{InMemoryIndex, NoopRetriever, RetrieverChain};
use tracing::{info, warn};

/// Build the retriever chain in the configured backend order.
///
/// A backend that cannot be set up at startup is skipped with a warning;
/// the remaining backends still serve requests.
pub async fn build_retrievers(config: &AppConfig) -> Result<RetrieverChain, Box<dyn std::error::Error>> {
    let r = &config.retrieval;
    let timeout = Duration::from_secs(r.timeout_secs);
    let mut chain = RetrieverChain::new().with_retries(r.retries);

    for backend in &r.backends {
        match backend.as_str() {
            "memory" => {
                let index = match &r.index_path {
                    Some(path) => match InMemoryIndex::load_jsonl(path).await {
                        Ok(index) => index,
                        Err(e) => {
                            warn!(backend = "memory", path = %path.display(), error = %e, "Skipping retrieval backend");
                            continue;
                        }
                    },
                    None => {
                        warn!(backend = "memory", "No retrieval.index_path set, memory index is empty");
                        InMemoryIndex::new()
                    }
                };
                info!(backend = "memory", documents = index.len().await, "Retrieval backend ready");
                chain = chain.add(Arc::new(index.with_min_score(r.min_score)), timeout);
            }
            "postgres" => {
                if let Some(retriever) = postgres_backend(config, timeout).await? {
                    chain = chain.add(retriever, timeout);
                }
            }
            "none" => chain = chain.add(Arc::new(NoopRetriever), timeout),
            other => return Err(format!("unknown retrieval backend '{other}'").into()),
        }
    }

    Ok(chain)
}

#[cfg(feature = "postgres")]
async fn postgres_backend(
    config: &AppConfig,
    timeout: Duration,
) -> Result<Option<Arc<dyn patentrag_core::VectorRetriever>>, Box<dyn std::error::Error>> {
    use patentrag_retrieval::PgVectorRetriever;

    let r = &config.retrieval;
    let Some(url) = r.database_url.as_deref() else {
        warn!(backend = "postgres", "No retrieval.database_url or DATABASE_URL set");
        return Ok(None);
    };

    match PgVectorRetriever::connect(url, timeout).await {
        Ok(retriever) => {
            let retriever = retriever
                .with_table(&r.table)?
                .with_embedding_dim(r.embedding_dim)
                .with_min_score(r.min_score);
            info!(backend = "postgres", table = %r.table, "Retrieval backend ready");
            Ok(Some(Arc::new(retriever)))
        }
        Err(e) => {
            warn!(backend = "postgres", error = %e, "Skipping retrieval backend");
            Ok(None)
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn postgres_backend(
    _config: &AppConfig,
    _timeout: Duration,
) -> Result<Option<Arc<dyn patentrag_core::VectorRetriever>>, Box<dyn std::error::Error>> {
    Err("retrieval backend 'postgres' requires building with --features postgres".into())
}

/// Build the whole pipeline from configuration.
pub async fn build_pipeline(config: &AppConfig) -> Result<PatentPipeline, Box<dyn std::error::Error>> {
    let services = patentrag_providers::build_from_config(config)
        .map_err(|e| format!("Failed to build remote services: {e}"))?;
    let retrievers = build_retrievers(config).await?;

    info!(
        backend = ?config.backend,
        retrievers = ?retrievers.backend_names(),
        "Pipeline bootstrapped"
    );

    Ok(PatentPipeline::from_config(config, services, retrievers))
}
