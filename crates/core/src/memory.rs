//! Conversation memory: facts derived from recent history.
//!
//! Memory here is ephemeral: it is recomputed from the conversation log on
//! every request and never persisted on its own. The extractor that fills it
//! lives in the pipeline crate; this module only defines the shapes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single fact recovered from a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFact {
    /// Which pattern produced the fact (e.g. "interest", "claim_focus").
    pub fact_type: String,

    /// The captured text window.
    pub content: String,

    /// Recency; always `>= 1`.
    pub turns_ago: usize,
}

impl MemoryFact {
    /// Render as `"<content> (<turns_ago> turns ago)"`. The unit is fixed
    /// so the prompt format never varies with the count.
    pub fn render(&self) -> String {
        format!("{} ({} turns ago)", self.content, self.turns_ago)
    }
}

/// Everything the extractor produced for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryContext {
    /// Most recent first.
    pub facts: Vec<MemoryFact>,

    /// Dominant topics, sorted for deterministic rendering.
    pub topics: BTreeSet<String>,
}

impl MemoryContext {
    /// True when there is nothing worth injecting into the prompt.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.topics.is_empty()
    }
}
