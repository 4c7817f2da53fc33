//! Conversation memory extraction.
//!
//! Scans the user turns of a bounded history window for trigger phrases
//! ("searching ...", "interested in ...", "…를 찾고 있어요") and turns each
//! match into a [`MemoryFact`]. Topics are tagged independently from a
//! fixed keyword vocabulary.
//!
//! Both tables are static data. Changing either one bumps
//! [`PATTERN_TABLE_VERSION`] so tests and logs can tell revisions apart.
//!
//! # Determinism
//!
//! [`MemoryExtractor::extract`] is a pure function of its input: no clock,
//! no randomness, no state between calls. Topics live in a `BTreeSet`, so
//! their iteration order is stable too.
//!
//! Pattern matching on raw strings is heuristic. A more robust extractor
//! can replace this one as long as it keeps the `extract` contract.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use patentrag_config::MAX_MEMORY_FACTS;
use patentrag_core::{ConversationTurn, MemoryContext, MemoryFact, Role};
use regex::Regex;
use tracing::debug;

/// Revision of [`PATTERN_TABLE`] and [`TOPIC_TABLE`].
pub const PATTERN_TABLE_VERSION: u32 = 1;

/// Which side of the trigger the captured tokens come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureWindow {
    /// The trigger plus up to `n` tokens after it (English phrasing).
    Following(usize),
    /// Up to `n` tokens before the trigger, plus the trigger (Korean phrasing).
    Preceding(usize),
}

/// One row of the trigger table.
#[derive(Debug, Clone, Copy)]
pub struct FactPattern {
    pub pattern: &'static str,
    pub fact_type: &'static str,
    pub window: CaptureWindow,
}

/// Trigger phrases, checked in order against every user turn.
pub const PATTERN_TABLE: &[FactPattern] = &[
    FactPattern {
        pattern: r"(?i)\bsearching(?:\s+for)?\b",
        fact_type: "interest",
        window: CaptureWindow::Following(4),
    },
    FactPattern {
        pattern: r"(?i)\blooking\s+(?:for|into)\b",
        fact_type: "interest",
        window: CaptureWindow::Following(4),
    },
    FactPattern {
        pattern: r"(?i)\binterested\s+in\b",
        fact_type: "interest",
        window: CaptureWindow::Following(4),
    },
    FactPattern {
        pattern: r"(?i)\b(?:my|our)\s+(?:invention|application|claim)\b",
        fact_type: "invention",
        window: CaptureWindow::Following(5),
    },
    FactPattern {
        pattern: r"(?:찾고\s*있|검색\s*중|검색하고\s*있|알아보고\s*있)",
        fact_type: "interest",
        window: CaptureWindow::Preceding(3),
    },
    FactPattern {
        pattern: r"관심이\s*있",
        fact_type: "interest",
        window: CaptureWindow::Preceding(3),
    },
    FactPattern {
        pattern: r"(?:제\s*발명|저의\s*발명|우리\s*발명|출원한)",
        fact_type: "invention",
        window: CaptureWindow::Following(5),
    },
];

/// Topic vocabulary: `(topic, keywords)`. A topic is tagged when any
/// keyword occurs in a user turn, case-insensitively.
pub const TOPIC_TABLE: &[(&str, &[&str])] = &[
    ("novelty", &["novelty", "novel", "신규성"]),
    ("inventive_step", &["inventive step", "obviousness", "진보성"]),
    ("clarity", &["clarity", "indefinite", "명확성", "기재불비"]),
    ("claims", &["claim", "청구항", "청구범위"]),
    ("rejection", &["rejection", "rejected", "거절"]),
    ("registration", &["registration", "granted", "등록"]),
    ("prior_art", &["prior art", "선행기술", "선행문헌", "인용발명"]),
    ("board_game", &["board-game", "board game", "보드게임"]),
];

struct CompiledPattern {
    regex: Regex,
    fact_type: &'static str,
    window: CaptureWindow,
}

static COMPILED: LazyLock<Vec<CompiledPattern>> = LazyLock::new(|| {
    PATTERN_TABLE
        .iter()
        .map(|p| CompiledPattern {
            regex: Regex::new(p.pattern).expect("valid regex"),
            fact_type: p.fact_type,
            window: p.window,
        })
        .collect()
});

/// Extracts [`MemoryContext`] from conversation history.
#[derive(Debug, Clone)]
pub struct MemoryExtractor {
    max_facts: usize,
}

impl Default for MemoryExtractor {
    fn default() -> Self {
        Self {
            max_facts: MAX_MEMORY_FACTS,
        }
    }
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_facts` facts, most recent first. Capped at
    /// [`MAX_MEMORY_FACTS`].
    pub fn with_max_facts(mut self, max_facts: usize) -> Self {
        self.max_facts = max_facts.min(MAX_MEMORY_FACTS);
        self
    }

    /// Extract facts and topics from `history`.
    ///
    /// `turns_ago` is `history.len() - position`, so the last turn is one
    /// turn ago. Callers pass an already-windowed history (see
    /// [`patentrag_core::conversation::recent_window`]), where position and
    /// `turn_index` agree.
    pub fn extract(&self, history: &[ConversationTurn]) -> MemoryContext {
        let mut facts: Vec<MemoryFact> = Vec::new();
        let mut topics = BTreeSet::new();

        for (position, turn) in history.iter().enumerate().rev() {
            if turn.role != Role::User {
                continue;
            }
            let turns_ago = history.len() - position;

            for pattern in COMPILED.iter() {
                let Some(content) = capture(&pattern.regex, pattern.window, &turn.content) else {
                    continue;
                };
                if facts.iter().any(|f| f.content == content) {
                    continue;
                }
                facts.push(MemoryFact {
                    fact_type: pattern.fact_type.to_string(),
                    content,
                    turns_ago,
                });
            }

            let lowered = turn.content.to_lowercase();
            for (topic, keywords) in TOPIC_TABLE {
                if keywords.iter().any(|k| lowered.contains(k)) {
                    topics.insert((*topic).to_string());
                }
            }
        }

        facts.truncate(self.max_facts);

        debug!(
            facts = facts.len(),
            topics = topics.len(),
            table_version = PATTERN_TABLE_VERSION,
            "Memory extracted"
        );

        MemoryContext { facts, topics }
    }
}

/// Capture the token window around the first match of `regex` in `text`.
fn capture(regex: &Regex, window: CaptureWindow, text: &str) -> Option<String> {
    let m = regex.find(text)?;
    // Widen the match to whole tokens.
    let start = text[..m.start()]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let end = text[m.end()..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, _)| m.end() + i)
        .unwrap_or(text.len());
    let trigger_tokens = text[start..end].split_whitespace().count().max(1);

    let tokens: Vec<&str> = match window {
        CaptureWindow::Following(n) => text[start..]
            .split_whitespace()
            .take(trigger_tokens + n)
            .collect(),
        CaptureWindow::Preceding(n) => {
            let before: Vec<&str> = text[..end].split_whitespace().collect();
            let skip = before.len().saturating_sub(trigger_tokens + n);
            before[skip..].to_vec()
        }
    };

    let content = tokens
        .join(" ")
        .trim_end_matches(['.', '?', '!', ',', ';', ':'])
        .to_string();
    (!content.is_empty()).then_some(content)
}
