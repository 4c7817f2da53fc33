//! In-memory vector index.
//!
//! Exact cosine search over documents held in a `Vec`. Loaded from a JSONL
//! corpus at startup or filled programmatically in tests. The whole index is
//! scanned per query, which is fine for corpora of a few hundred thousand
//! documents.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use patentrag_core::document::rank_hits;
use patentrag_core::{Document, RetrievalError, RetrievedHit, VectorRetriever};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::vector::vector_search;

const BACKEND: &str = "memory";

pub struct InMemoryIndex {
    documents: Arc<RwLock<Vec<Document>>>,
    /// Fixed by the first document inserted.
    dimension: Arc<RwLock<Option<usize>>>,
    min_score: f32,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            dimension: Arc::new(RwLock::new(None)),
            min_score: f32::NEG_INFINITY,
        }
    }

    /// Drop hits whose similarity is below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Build an index from documents, validating dimensions.
    pub async fn from_documents(
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<Self, RetrievalError> {
        let index = Self::new();
        for doc in documents {
            index.insert(doc).await?;
        }
        Ok(index)
    }

    /// Load `{doc_id, title, text, embedding, source_ids}` records, one per line.
    ///
    /// Blank lines are skipped. A record whose embedding length differs from
    /// the first record's is rejected.
    pub async fn load_jsonl(path: &Path) -> Result<Self, RetrievalError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::unavailable(
                BACKEND,
                format!("failed to read corpus {}: {e}", path.display()),
            )
        })?;

        let index = Self::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let doc: Document = serde_json::from_str(line).map_err(|e| {
                RetrievalError::unavailable(
                    BACKEND,
                    format!("{}:{}: invalid record: {e}", path.display(), line_no + 1),
                )
            })?;
            index.insert(doc).await?;
        }

        info!(
            path = %path.display(),
            documents = index.len().await,
            "Loaded in-memory index"
        );
        Ok(index)
    }

    /// Add one document. Documents without an embedding are not searchable.
    pub async fn insert(&self, doc: Document) -> Result<(), RetrievalError> {
        if !doc.embedding.is_empty() {
            let mut dim = self.dimension.write().await;
            match *dim {
                Some(expected) if expected != doc.embedding.len() => {
                    return Err(RetrievalError::DimensionMismatch {
                        expected,
                        actual: doc.embedding.len(),
                    });
                }
                Some(_) => {}
                None => *dim = Some(doc.embedding.len()),
            }
        }
        self.documents.write().await.push(doc);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn dimension(&self) -> Option<usize> {
        *self.dimension.read().await
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorRetriever for InMemoryIndex {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedHit>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }
        if let Some(expected) = self.dimension().await
            && expected != query.len()
        {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        let documents = self.documents.read().await;
        let scored = vector_search(&documents, query, top_k, self.min_score);
        debug!(candidates = documents.len(), hits = scored.len(), "In-memory search");
        Ok(rank_hits(scored))
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.len().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn doc(id: &str, embedding: Vec<f32>) -> Document {
        Document::new(id, format!("{id} title"), format!("{id} body")).with_embedding(embedding)
    }

    #[tokio::test]
    async fn search_returns_ranked_hits() {
        let index = InMemoryIndex::from_documents(vec![
            doc("far", vec![0.0, 1.0]),
            doc("near", vec![1.0, 0.0]),
            doc("mid", vec![0.7, 0.7]),
        ])
        .await
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.doc_id, "near");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].document.doc_id, "mid");
        assert_eq!(hits[1].rank, 2);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn empty_index_returns_empty_list() {
        let index = InMemoryIndex::new();
        let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn min_score_can_filter_everything() {
        let index = InMemoryIndex::from_documents(vec![doc("a", vec![0.0, 1.0])])
            .await
            .unwrap()
            .with_min_score(0.5);
        let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_is_rejected() {
        let index = InMemoryIndex::new();
        let err = index.search(&[1.0], 0).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidTopK));
    }

    #[tokio::test]
    async fn query_dimension_must_match() {
        let index = InMemoryIndex::from_documents(vec![doc("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let err = index.search(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[tokio::test]
    async fn insert_rejects_mixed_dimensions() {
        let index = InMemoryIndex::new();
        index.insert(doc("a", vec![1.0, 0.0])).await.unwrap();
        let err = index.insert(doc("b", vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn loads_jsonl_corpus() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"doc_id": "1020200001", "title": "보드게임 장치", "text": "주사위를 이용한 보드게임", "embedding": [1.0, 0.0]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"doc_id": "1020200002", "title": "카드게임", "text": "카드 배분 장치", "embedding": [0.0, 1.0], "source_ids": ["s1"]}}"#
        )
        .unwrap();

        let index = InMemoryIndex::load_jsonl(file.path()).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.dimension().await, Some(2));

        let hits = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].document.doc_id, "1020200002");
        assert_eq!(hits[0].document.source_ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn jsonl_with_bad_dimension_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"doc_id": "a", "text": "x", "embedding": [1.0, 0.0]}}"#).unwrap();
        writeln!(file, r#"{{"doc_id": "b", "text": "y", "embedding": [1.0]}}"#).unwrap();

        let err = InMemoryIndex::load_jsonl(file.path()).await.err().unwrap();
        assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[tokio::test]
    async fn missing_corpus_is_unavailable() {
        let err = InMemoryIndex::load_jsonl(Path::new("/nonexistent/corpus.jsonl"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::Unavailable { .. }));
    }
}
