//! Prompt composition.
//!
//! Builds the generator prompt from four sections, always in this order:
//!
//! | # | Section | Placement | Rendered when |
//! |---|---------|-----------|---------------|
//! | 1 | Policy preamble + route instructions | system | always |
//! | 2 | Conversation memory | user | facts or topics present |
//! | 3 | Numbered documents + citation mapping | user | always (placeholder when empty) |
//! | 4 | Live query | user | always |
//!
//! Document text is truncated to a fixed character budget here and nowhere
//! else. Citation labels are read from the [`CitationMapping`] handed in by
//! the caller, never regenerated.

use std::fmt::Write as _;

use patentrag_core::{
    CitationMapping, ClassificationResult, MemoryContext, OutcomeLabel, Prompt, RetrievedHit,
};
use tracing::debug;

/// Output-language and citation-format rules shared by both routes.
pub const POLICY_PREAMBLE: &str = "당신은 특허 분석 전문가입니다.\n\
규칙:\n\
1) 반드시 한국어만 사용하고 한자를 포함한 중국어, 일본어 등 외국 문자를 절대 사용하지 마십시오.\n\
2) 출력은 줄바꿈 없이 한 단락의 한국어 공식 문장으로만 작성하십시오.\n\
3) 유사 특허를 언급할 때는 반드시 'CITATION_N(출원번호 XXXXX)' 형식으로 표기하고, 매핑 목록에 있는 라벨만 사용하십시오.";

const REJECTION_INSTRUCTIONS: &str = "거절 사유(신규성, 진보성, 명확성 등)를 판별하고 핵심 근거를 3문장 이내로 간결히 설명하십시오. \
유사점과 차이점을 명확히 지적하고, 마지막은 '따라서 특허를 받을 수 없습니다.'로 끝내십시오.";

const REGISTRATION_INSTRUCTIONS: &str =
    "유사 특허와의 차이점을 짚고, 등록 가능성이 있는 이유를 한 단락으로 설명하십시오.";

const NO_DOCUMENTS_INSTRUCTIONS: &str = "관련된 특허 문서를 찾지 못했습니다. 이 사실을 먼저 밝히고, \
출원번호나 인용 라벨을 지어내지 마십시오.";

/// Composes [`Prompt`]s from retrieved context.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    doc_char_budget: usize,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            doc_char_budget: 300,
        }
    }
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters of document text kept per hit.
    pub fn with_doc_char_budget(mut self, budget: usize) -> Self {
        self.doc_char_budget = budget;
        self
    }

    pub fn doc_char_budget(&self) -> usize {
        self.doc_char_budget
    }

    /// Compose the prompt for one request.
    ///
    /// `mapping` must have been built from `hits`; entry *i* labels hit *i*.
    /// A missing classification takes the registration instructions.
    pub fn compose(
        &self,
        query: &str,
        hits: &[RetrievedHit],
        classification: Option<&ClassificationResult>,
        memory: &MemoryContext,
        mapping: &CitationMapping,
    ) -> Prompt {
        debug_assert_eq!(hits.len(), mapping.len(), "mapping must cover every hit");

        let route = classification
            .map(|c| c.label)
            .unwrap_or(OutcomeLabel::Registration);

        // ── Section 1: policy preamble + route instructions ──
        let mut system = String::from(POLICY_PREAMBLE);
        system.push_str("\n\n");
        system.push_str(match route {
            OutcomeLabel::Rejection => REJECTION_INSTRUCTIONS,
            OutcomeLabel::Registration => REGISTRATION_INSTRUCTIONS,
        });
        if hits.is_empty() {
            system.push(' ');
            system.push_str(NO_DOCUMENTS_INSTRUCTIONS);
        }

        let mut user = String::new();

        // ── Section 2: memory ──
        if !memory.is_empty() {
            user.push_str("[대화 기억]\n");
            for fact in &memory.facts {
                let _ = writeln!(user, "- {}", fact.render());
            }
            if !memory.topics.is_empty() {
                let topics: Vec<&str> = memory.topics.iter().map(String::as_str).collect();
                let _ = writeln!(user, "- 주제: {}", topics.join(", "));
            }
            user.push('\n');
        }

        // ── Section 3: documents ──
        if hits.is_empty() {
            user.push_str("[유사 특허 목록]\n(관련 특허 문서 없음)\n\n");
        } else {
            let _ = writeln!(user, "[유사 특허 목록 (상위 {}개)]", hits.len());
            for (entry, hit) in mapping.entries().iter().zip(hits) {
                let doc = &hit.document;
                let _ = write!(
                    user,
                    "{}) [출원번호: {}]\n제목: {}\n내용: {}\n\n",
                    entry.label,
                    doc.doc_id,
                    flatten(&doc.title),
                    truncate_chars(&flatten(&doc.text), self.doc_char_budget),
                );
            }
            user.push_str("[인용 라벨-출원번호 매핑]\n");
            for entry in mapping.entries() {
                let _ = writeln!(user, "- {}: 출원번호 {}", entry.label, entry.doc_id);
            }
            user.push('\n');
        }

        // ── Section 4: live query ──
        let _ = write!(user, "[사용자 질문]\n{}\n\n위 정보를 바탕으로 답변하십시오.", query.trim());

        debug!(
            route = %route,
            hits = hits.len(),
            memory_facts = memory.facts.len(),
            system_chars = system.chars().count(),
            user_chars = user.chars().count(),
            "Prompt composed"
        );

        Prompt::new(system, user)
    }
}

/// Keep the first `budget` characters of `text`, marking the cut with `...`.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Collapse whitespace runs (newlines included) into single spaces.
fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
