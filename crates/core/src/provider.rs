//! Service traits: the abstraction over remote model backends.
//!
//! The pipeline talks to three kinds of remote service: an embedder, an
//! outcome classifier and one generator per model identity. Each is a trait
//! here so that the process bootstrap can inject whichever stack is
//! configured (model server, OpenAI-compatible API, or test doubles).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classification::ClassificationResult;
use crate::error::{ClassificationError, GenerationError, ServiceError};

/// Identifier of a generative model (e.g. "patent-rejection-ko", "gpt-4o-mini").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A composed prompt: system instructions plus the user turn.
///
/// Stacks frame it differently (ChatML for the model server, chat messages
/// for OpenAI-compatible APIs) but always from these two sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Render as a ChatML conversation ending with an open assistant turn.
    pub fn to_chatml(&self) -> String {
        format!(
            "<|im_start|>system\n{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant",
            self.system, self.user
        )
    }

    /// Plain concatenation of both sections.
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Decoding parameters sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    /// Maximum tokens to generate
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Whether to sample; `false` means greedy or beam search
    #[serde(default)]
    pub do_sample: bool,

    /// Temperature (only meaningful when sampling)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_num_beams")]
    pub num_beams: u32,

    /// Forbid repeating any n-gram of this size (0 disables)
    #[serde(default)]
    pub no_repeat_ngram_size: u32,

    /// Below 1.0 favours shorter beams
    #[serde(default = "default_one")]
    pub length_penalty: f32,

    #[serde(default = "default_one")]
    pub repetition_penalty: f32,
}

fn default_max_new_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_num_beams() -> u32 {
    1
}

fn default_one() -> f32 {
    1.0
}

impl DecodingParams {
    /// Conservative beam-search decoding for rejection reasoning.
    pub fn rejection() -> Self {
        Self {
            max_new_tokens: 256,
            do_sample: false,
            temperature: 0.0,
            top_p: 1.0,
            num_beams: 3,
            no_repeat_ngram_size: 3,
            length_penalty: 0.9,
            repetition_penalty: 1.1,
        }
    }

    /// Standard sampling decoding for the general model.
    pub fn registration() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            do_sample: true,
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_beams: default_num_beams(),
            no_repeat_ngram_size: 0,
            length_penalty: default_one(),
            repetition_penalty: default_one(),
        }
    }
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self::registration()
    }
}

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Embed one text. Implementations return normalized vectors.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

/// Predicts a binary outcome from one document's text.
#[async_trait]
pub trait OutcomeClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError>;

    async fn health_check(&self) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

/// One generative model identity.
///
/// Generators never retry internally; retry policy belongs to the caller.
#[async_trait]
pub trait Generator: Send + Sync {
    /// The model this handle serves.
    fn model_id(&self) -> &ModelId;

    /// Run the prompt with the given decoding parameters and return raw text.
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &DecodingParams,
    ) -> Result<String, GenerationError>;

    /// Whether the model is currently able to serve requests.
    ///
    /// Used by the router to pick a candidate before generating. The default
    /// assumes availability.
    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_preset_is_conservative() {
        let p = DecodingParams::rejection();
        assert!(!p.do_sample);
        assert_eq!(p.num_beams, 3);
        assert_eq!(p.max_new_tokens, 256);
        assert!(p.length_penalty < 1.0);
        assert!(p.repetition_penalty > 1.0);
    }

    #[test]
    fn registration_preset_samples() {
        let p = DecodingParams::registration();
        assert!(p.do_sample);
        assert!((p.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(p, DecodingParams::default());
    }

    #[test]
    fn decoding_params_fill_defaults_from_partial_toml_like_json() {
        let p: DecodingParams = serde_json::from_str(r#"{"num_beams": 4}"#).unwrap();
        assert_eq!(p.num_beams, 4);
        assert_eq!(p.max_new_tokens, 512);
        assert!((p.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn chatml_framing() {
        let prompt = Prompt::new("rules", "question");
        assert_eq!(
            prompt.to_chatml(),
            "<|im_start|>system\nrules<|im_end|>\n<|im_start|>user\nquestion<|im_end|>\n<|im_start|>assistant"
        );
        assert_eq!(prompt.text(), "rules\n\nquestion");
    }

    #[test]
    fn model_id_display() {
        assert_eq!(ModelId::new("gpt-4o-mini").to_string(), "gpt-4o-mini");
    }
}
