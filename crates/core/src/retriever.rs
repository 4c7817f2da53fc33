//! Vector Retriever trait.
//!
//! Backends (in-memory index, database-resident vector column, ...) live in
//! the retrieval crate; the rest of the pipeline only sees this contract.

use async_trait::async_trait;

use crate::document::RetrievedHit;
use crate::error::RetrievalError;

#[async_trait]
pub trait VectorRetriever: Send + Sync {
    /// Backend name for logs and response metadata.
    fn name(&self) -> &str;

    /// Return up to `top_k` hits ordered by descending similarity.
    ///
    /// An empty list is a valid result. Ties keep the backend's own order.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedHit>, RetrievalError>;

    /// Number of indexed documents, if the backend knows it cheaply.
    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(0)
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        Ok(true)
    }
}
