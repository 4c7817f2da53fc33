//! Citation labels and the label-to-document mapping.
//!
//! The mapping is built once per request from the hits shown to the
//! generator, in rank order, and is never regenerated mid-request.

use serde::{Deserialize, Serialize};

use crate::document::RetrievedHit;

/// Prefix of every citation token.
pub const CITATION_PREFIX: &str = "CITATION_";

/// Render the label for the `index`-th (1-based) document.
pub fn citation_label(index: usize) -> String {
    format!("{CITATION_PREFIX}{index}")
}

/// One `{label, doc_id}` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub label: String,
    pub doc_id: String,
}

/// Ordered mapping from `CITATION_i` labels to document ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationMapping {
    entries: Vec<CitationEntry>,
}

impl CitationMapping {
    /// Build the mapping 1:1 with `hits`, labels `CITATION_1..=CITATION_N`.
    pub fn from_hits(hits: &[RetrievedHit]) -> Self {
        let entries = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| CitationEntry {
                label: citation_label(i + 1),
                doc_id: hit.document.doc_id.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CitationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `label` was issued for this request.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.label == label)
    }

    /// Look up the document id behind a label.
    pub fn doc_id(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.doc_id.as_str())
    }
}
