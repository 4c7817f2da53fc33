//! Conversation history as seen by the pipeline.
//!
//! The history log is owned and appended by the caller. The pipeline reads a
//! bounded suffix of it and never writes back.

use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant (including the older "ai" spelling used by stored logs)
    #[serde(alias = "ai")]
    Assistant,
}

/// A single turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who wrote this turn
    #[serde(alias = "type")]
    pub role: Role,

    /// The text content
    pub content: String,

    /// Position in the history slice handed to the pipeline (0-based).
    #[serde(default)]
    pub turn_index: usize,
}

impl ConversationTurn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>, turn_index: usize) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            turn_index,
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>, turn_index: usize) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            turn_index,
        }
    }
}

/// Build an indexed history from ordered `(role, content)` pairs.
///
/// This is the shape the conversation store hands over; indices are assigned
/// in order so that `turn_index` always matches the slice position.
pub fn history_from_pairs<I, S>(pairs: I) -> Vec<ConversationTurn>
where
    I: IntoIterator<Item = (Role, S)>,
    S: Into<String>,
{
    pairs
        .into_iter()
        .enumerate()
        .map(|(turn_index, (role, content))| ConversationTurn {
            role,
            content: content.into(),
            turn_index,
        })
        .collect()
}

/// Keep only the last `window` turns, re-indexing them from 0.
///
/// Older turns are dropped entirely, never summarized.
pub fn recent_window(history: &[ConversationTurn], window: usize) -> Vec<ConversationTurn> {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .enumerate()
        .map(|(turn_index, turn)| ConversationTurn {
            turn_index,
            ..turn.clone()
        })
        .collect()
}
