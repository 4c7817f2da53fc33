//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token. Hangul syllables
//! are three bytes in UTF-8, which lands close to what BPE tokenizers
//! produce for Korean text. The estimate only feeds response metadata.

use patentrag_core::Prompt;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a composed prompt including per-section overhead.
///
/// Each section costs ~4 tokens for role markers and delimiters.
pub fn estimate_prompt_tokens(prompt: &Prompt) -> usize {
    let overhead = 4;
    2 * overhead + estimate_tokens(&prompt.system) + estimate_tokens(&prompt.user)
}
