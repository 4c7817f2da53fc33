//! Model-server client.
//!
//! Talks to the self-hosted inference server that exposes the embedding
//! model, the binary outcome classifier and the generative models:
//!
//! - `POST /embed {text, normalize}` → `{embedding}`
//! - `POST /classify {texts, top_k}` → `{classifications: [{predictions: [{label, confidence}]}]}`
//! - `POST /generate {prompt, model, ...decoding}` → `{response}`
//! - `GET /health` → `{status, models: {name: bool}}`
//!
//! Generation prompts are framed as ChatML before they are sent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patentrag_core::{
    ClassificationError, ClassificationResult, DecodingParams, Embedder, GenerationError,
    Generator, ModelId, OutcomeClassifier, OutcomeLabel, Prompt, ServiceError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, generation_error, send_json};

/// Shared HTTP handle to one model server.
pub struct ModelServerClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    generate_timeout: Duration,
    health_timeout: Duration,
}

impl ModelServerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(30);
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
            timeout,
            generate_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
        })
    }

    pub fn from_config(config: &patentrag_config::ModelServerConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(&config.url)?
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_generate_timeout(Duration::from_secs(config.generate_timeout_secs))
            .with_health_timeout(Duration::from_secs(config.health_timeout_secs)))
    }

    /// Timeout for embed and classify calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch `/health`.
    pub async fn health(&self) -> Result<HealthResponse, ServiceError> {
        send_json(
            self.client
                .get(self.url("/health"))
                .timeout(self.health_timeout),
        )
        .await
    }

    /// Run `/generate` for `model` and return the raw response text.
    pub async fn generate_raw(
        &self,
        model: &ModelId,
        prompt: &str,
        params: &DecodingParams,
    ) -> Result<String, ServiceError> {
        let body = GenerateRequest {
            prompt,
            model: model.as_str(),
            max_length: params.max_new_tokens,
            params,
        };

        debug!(model = %model, prompt_chars = prompt.chars().count(), "Sending generate request");

        let resp: GenerateResponse = send_json(
            self.client
                .post(self.url("/generate"))
                .timeout(self.generate_timeout)
                .json(&body),
        )
        .await?;
        Ok(resp.response)
    }
}

#[async_trait]
impl Embedder for ModelServerClient {
    fn name(&self) -> &str {
        "model_server"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let resp: EmbedResponse = send_json(
            self.client
                .post(self.url("/embed"))
                .timeout(self.timeout)
                .json(&EmbedRequest {
                    text,
                    normalize: true,
                }),
        )
        .await?;

        if resp.embedding.is_empty() {
            return Err(ServiceError::MalformedResponse("empty embedding".into()));
        }
        Ok(resp.embedding)
    }

    async fn health_check(&self) -> Result<bool, ServiceError> {
        Ok(self.health().await?.model_ready("embedding"))
    }
}

#[async_trait]
impl OutcomeClassifier for ModelServerClient {
    fn name(&self) -> &str {
        "model_server"
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        let resp: ClassifyResponse = send_json(
            self.client
                .post(self.url("/classify"))
                .timeout(self.timeout)
                .json(&ClassifyRequest {
                    texts: vec![text],
                    top_k: 2,
                }),
        )
        .await?;
        resp.into_result()
    }

    async fn health_check(&self) -> Result<bool, ServiceError> {
        Ok(self.health().await?.model_ready("classification"))
    }
}

/// One generative model served by a [`ModelServerClient`].
pub struct ModelServerGenerator {
    client: Arc<ModelServerClient>,
    model: ModelId,
}

impl ModelServerGenerator {
    pub fn new(client: Arc<ModelServerClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: ModelId::new(model),
        }
    }
}

#[async_trait]
impl Generator for ModelServerGenerator {
    fn model_id(&self) -> &ModelId {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        let text = self
            .client
            .generate_raw(&self.model, &prompt.to_chatml(), params)
            .await
            .map_err(|e| generation_error(self.model.as_str(), e, self.client.generate_timeout))?;

        if text.trim().is_empty() {
            return Err(GenerationError::Backend {
                model: self.model.to_string(),
                reason: "empty response".into(),
            });
        }
        Ok(text)
    }

    async fn is_available(&self) -> bool {
        match self.client.health().await {
            Ok(health) => health.model_ready(self.model.as_str()),
            Err(e) => {
                debug!(model = %self.model, error = %e, "Model server health check failed");
                false
            }
        }
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
    normalize: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    texts: Vec<&'a str>,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    classifications: Vec<ClassificationEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassificationEntry {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    confidence: f32,
}

impl ClassifyResponse {
    /// Pick the highest-confidence prediction for the single input text.
    fn into_result(self) -> Result<ClassificationResult, ClassificationError> {
        let best = self
            .classifications
            .into_iter()
            .next()
            .and_then(|c| {
                c.predictions
                    .into_iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            })
            .ok_or_else(|| ClassificationError::MalformedResponse("no predictions".into()))?;

        let label = OutcomeLabel::parse(&best.label).ok_or_else(|| {
            ClassificationError::MalformedResponse(format!("unknown label '{}'", best.label))
        })?;
        Ok(ClassificationResult::new(label, best.confidence))
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    /// Older servers read the token limit from this field.
    max_length: u32,
    #[serde(flatten)]
    params: &'a DecodingParams,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// `/health` body.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub models: HashMap<String, bool>,
}

impl HealthResponse {
    /// Whether `model` is loaded. Servers that do not list models are
    /// trusted on their overall status.
    pub fn model_ready(&self, model: &str) -> bool {
        match self.models.get(model) {
            Some(ready) => *ready,
            None => self.models.is_empty() && self.status == "healthy",
        }
    }
}
