//! No-op retriever: disables document retrieval entirely.

use async_trait::async_trait;
use patentrag_core::{RetrievalError, RetrievedHit, VectorRetriever};

/// A retriever that never finds anything.
pub struct NoopRetriever;

#[async_trait]
impl VectorRetriever for NoopRetriever {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(
        &self,
        _query: &[f32],
        _top_k: usize,
    ) -> Result<Vec<RetrievedHit>, RetrievalError> {
        Ok(Vec::new())
    }
}
