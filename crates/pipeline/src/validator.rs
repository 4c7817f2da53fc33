//! Response validation and post-processing.
//!
//! Raw generator output goes through these steps, in order:
//!
//! 1. Strip chat-template artifacts (`<|im_end|>` and friends).
//! 2. Drop every character outside the allow-list (Hangul, ASCII
//!    letters/digits, whitespace, a bounded punctuation set).
//! 3. With no documents in the mapping, remove citation tokens and lead
//!    with [`NO_DOCUMENTS_NOTICE`].
//! 4. Collapse whitespace, newlines included, into single spaces.
//! 5. On the rejection route, end with [`CLOSING_CLAUSE`].
//! 6. Check every `CITATION_i` against the mapping. Orphans are logged and
//!    reported as [`ValidationWarning`]s; the text is left as is.
//!
//! Every step is idempotent, so a finalized answer passes through again
//! byte-for-byte.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use patentrag_core::{CitationMapping, ClassificationResult, OutcomeLabel, ValidationWarning};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

/// Mandated ending for every rejection-route answer.
pub const CLOSING_CLAUSE: &str = "따라서 특허를 받을 수 없습니다.";

/// Lead sentence when retrieval produced no documents.
pub const NO_DOCUMENTS_NOTICE: &str = "관련된 특허 문서를 찾지 못했습니다.";

const ALLOWED_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ':', ';', '\'', '"', '(', ')', '[', ']', '-', '_', '/', '%', '+', '=',
    '~', '·', '…',
];

static TEMPLATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|]*\|>").expect("valid regex"));

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CITATION_\d+").expect("valid regex"));

/// A citation token plus an optional `(출원번호 …)` suffix.
static CITATION_WITH_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CITATION_\d+(?:\s*\(\s*출원번호[^)]*\))?").expect("valid regex")
});

/// Final answer text plus the non-fatal findings from validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedAnswer {
    pub text: String,
    pub warnings: Vec<ValidationWarning>,
}

/// Stateless post-processor for generator output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run all post-processing steps over `raw`.
    pub fn finalize(
        &self,
        raw: &str,
        classification: Option<&ClassificationResult>,
        mapping: &CitationMapping,
    ) -> ValidatedAnswer {
        let mut warnings = Vec::new();
        let mut text = filter_allowed(&TEMPLATE_TOKEN_RE.replace_all(raw, " "));

        if mapping.is_empty() {
            warnings.extend(check_citations(&text, mapping));
            text = CITATION_WITH_SUFFIX_RE.replace_all(&text, " ").into_owned();
            text = collapse_whitespace(&text);
            if !text.contains(NO_DOCUMENTS_NOTICE) {
                text = if text.is_empty() {
                    NO_DOCUMENTS_NOTICE.to_string()
                } else {
                    format!("{NO_DOCUMENTS_NOTICE} {text}")
                };
            }
        } else {
            text = collapse_whitespace(&text);
        }

        if classification.map(|c| c.label) == Some(OutcomeLabel::Rejection) {
            text = enforce_closing_clause(&text);
        }

        if !mapping.is_empty() {
            warnings.extend(check_citations(&text, mapping));
        }

        ValidatedAnswer { text, warnings }
    }
}

/// Whether `c` survives the allow-list.
pub fn is_allowed_char(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{3131}'..='\u{318E}')
        || c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || ALLOWED_PUNCTUATION.contains(&c)
}

/// Remove every character outside the allow-list.
pub fn filter_allowed(text: &str) -> String {
    text.chars().filter(|&c| is_allowed_char(c)).collect()
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Make `text` end with [`CLOSING_CLAUSE`]. A no-op when it already does.
pub fn enforce_closing_clause(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.ends_with(CLOSING_CLAUSE) {
        return trimmed.to_string();
    }
    if trimmed.is_empty() {
        return CLOSING_CLAUSE.to_string();
    }

    let mut out = trimmed.to_string();
    if !out.ends_with(['.', '!', '?', '…']) {
        out.push('.');
    }
    out.push(' ');
    out.push_str(CLOSING_CLAUSE);
    out
}

/// Report every distinct citation label in `text` that `mapping` lacks.
pub fn check_citations(text: &str, mapping: &CitationMapping) -> Vec<ValidationWarning> {
    let mut seen = BTreeSet::new();
    let mut warnings = Vec::new();

    for m in CITATION_RE.find_iter(text) {
        let label = m.as_str().to_string();
        if mapping.contains(&label) || !seen.insert(label.clone()) {
            continue;
        }
        warn!(label = %label, known = mapping.len(), "Answer cites a document that was not in the prompt");
        warnings.push(ValidationWarning::OrphanCitation { label });
    }
    warnings
}
