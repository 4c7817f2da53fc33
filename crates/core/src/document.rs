//! Documents and retrieval hits.
//!
//! A [`Document`] is owned by the document store and never mutated by the
//! pipeline. A [`RetrievedHit`] wraps a document with the similarity and
//! 1-based rank it received for one query, and lives only for that request.

use serde::{Deserialize, Serialize};

/// An indexed patent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store identifier (application number for patents).
    pub doc_id: String,

    /// Document title
    #[serde(default)]
    pub title: String,

    /// Full document text
    pub text: String,

    /// Embedding vector. Backends that do not load vectors leave it empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,

    /// Identifiers of the source records this document was built from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ids: Vec<String>,
}

impl Document {
    /// Create a document without an embedding.
    pub fn new(
        doc_id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            title: title.into(),
            text: text.into(),
            embedding: Vec::new(),
            source_ids: Vec::new(),
        }
    }

    /// Attach an embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

/// One retrieved document plus its score and rank for a given query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedHit {
    pub document: Document,

    /// Similarity to the query (higher is closer).
    pub similarity: f32,

    /// 1-based position in the backend's result order.
    pub rank: usize,
}

/// Turn an ordered list of `(document, similarity)` pairs into ranked hits.
///
/// Order is taken as-is from the backend; ranks are assigned 1..=N.
pub fn rank_hits(scored: impl IntoIterator<Item = (Document, f32)>) -> Vec<RetrievedHit> {
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (document, similarity))| RetrievedHit {
            document,
            similarity,
            rank: i + 1,
        })
        .collect()
}
