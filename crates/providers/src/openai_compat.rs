//! OpenAI-compatible client.
//!
//! Works with OpenAI and any endpoint exposing `/v1/embeddings` and
//! `/v1/chat/completions` (vLLM, Ollama, OpenRouter, ...).
//!
//! Supplies all three remote services of the pipeline:
//! - embeddings
//! - generation via chat completions
//! - outcome classification by asking a chat model for a JSON verdict

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patentrag_core::{
    ClassificationError, ClassificationResult, DecodingParams, Embedder, GenerationError,
    Generator, ModelId, OutcomeClassifier, OutcomeLabel, Prompt, ServiceError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::{build_client, generation_error, send_json};

/// Classifier input is cut to this many characters.
const CLASSIFIER_CHAR_BUDGET: usize = 2000;

const CLASSIFIER_SYSTEM_PROMPT: &str = "당신은 특허 분류 전문가입니다. \
주어진 특허 텍스트를 분석하여 '거절' 또는 '등록'으로 분류하세요. \
응답은 반드시 JSON 형식으로: {\"classification\": \"거절\" 또는 \"등록\", \"confidence\": 0.0~1.0}";

/// Shared HTTP handle to an OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(120);
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(timeout)?,
            timeout,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ServiceError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
    }

    /// Run one chat completion and return the first choice's content.
    pub async fn chat(&self, request: &ChatRequest<'_>) -> Result<String, ServiceError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let resp: ChatResponse = send_json(self.post("/chat/completions").json(request)).await?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::MalformedResponse("No choices in response".into()))
    }

    /// Check the endpoint answers `/models`.
    pub async fn ping(&self) -> Result<bool, ServiceError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(crate::http::transport_error)?;
        Ok(response.status().is_success())
    }
}

/// Embeddings through `/embeddings`.
pub struct OpenAiEmbedder {
    client: Arc<OpenAiCompatClient>,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiCompatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions: None,
        }
    }

    /// Ask the endpoint to shorten vectors to `dimensions`.
    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
            encoding_format: "float",
            dimensions: self.dimensions,
        };

        debug!(provider = %self.client.name, model = %self.model, "Sending embedding request");

        let resp: EmbeddingApiResponse =
            send_json(self.client.post("/embeddings").json(&body)).await?;
        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::MalformedResponse("empty embedding".into()))
    }

    async fn health_check(&self) -> Result<bool, ServiceError> {
        self.client.ping().await
    }
}

/// One chat model used as a generator.
pub struct OpenAiChatGenerator {
    client: Arc<OpenAiCompatClient>,
    model: ModelId,
}

impl OpenAiChatGenerator {
    pub fn new(client: Arc<OpenAiCompatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: ModelId::new(model),
        }
    }
}

#[async_trait]
impl Generator for OpenAiChatGenerator {
    fn model_id(&self) -> &ModelId {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest::from_prompt(self.model.as_str(), prompt, params);
        let text = self
            .client
            .chat(&request)
            .await
            .map_err(|e| generation_error(self.model.as_str(), e, self.client.timeout))?;

        if text.trim().is_empty() {
            return Err(GenerationError::Backend {
                model: self.model.to_string(),
                reason: "empty response".into(),
            });
        }
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        match self.client.ping().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(model = %self.model, error = %e, "Chat endpoint unreachable");
                false
            }
        }
    }
}

/// A chat model asked for a `{"classification", "confidence"}` JSON verdict.
pub struct LlmClassifier {
    client: Arc<OpenAiCompatClient>,
    model: String,
}

impl LlmClassifier {
    pub fn new(client: Arc<OpenAiCompatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl OutcomeClassifier for LlmClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        let excerpt: String = text.chars().take(CLASSIFIER_CHAR_BUDGET).collect();
        let user = format!("다음 특허를 분류하세요:\n\n{excerpt}");
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(CLASSIFIER_SYSTEM_PROMPT),
                ChatMessage::user(&user),
            ],
            temperature: 0.3,
            top_p: None,
            max_tokens: Some(64),
            response_format: Some(ResponseFormat::json_object()),
        };

        let content = self.client.chat(&request).await?;
        parse_verdict(&content)
    }

    async fn health_check(&self) -> Result<bool, ServiceError> {
        self.client.ping().await
    }
}

#[derive(Deserialize)]
struct Verdict {
    classification: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

/// Parse the classifier's JSON verdict.
fn parse_verdict(content: &str) -> Result<ClassificationResult, ClassificationError> {
    let verdict: Verdict = serde_json::from_str(content.trim()).map_err(|e| {
        ClassificationError::MalformedResponse(format!("verdict is not valid JSON: {e}"))
    })?;
    let label = OutcomeLabel::parse(&verdict.classification).ok_or_else(|| {
        ClassificationError::MalformedResponse(format!(
            "unknown classification '{}'",
            verdict.classification
        ))
    })?;
    Ok(ClassificationResult::new(label, verdict.confidence))
}

// --- Wire types ---

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl<'a> ChatRequest<'a> {
    /// Map a prompt and decoding parameters onto chat-completion fields.
    ///
    /// Chat APIs have no beam search, so non-sampling decoding becomes
    /// temperature 0.
    pub fn from_prompt(model: &'a str, prompt: &'a Prompt, params: &DecodingParams) -> Self {
        let (temperature, top_p) = if params.do_sample {
            (params.temperature, Some(params.top_p))
        } else {
            (0.0, None)
        };
        Self {
            model,
            messages: vec![
                ChatMessage::system(&prompt.system),
                ChatMessage::user(&prompt.user),
            ],
            temperature,
            top_p,
            max_tokens: Some(params.max_new_tokens),
            response_format: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn system(content: &'a str) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    r#type: &'static str,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            r#type: "json_object",
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
