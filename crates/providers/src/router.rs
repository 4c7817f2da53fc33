//! Model router: selects the generator and decoding parameters for a request.
//!
//! Each route (rejection, registration) owns an ordered candidate list. The
//! first candidate that is available and generates serves the request;
//! skipping one is reported through `fallback_used` rather than hidden.

use std::sync::Arc;

use patentrag_config::{AppConfig, ServiceBackend};
use patentrag_core::{
    ClassificationResult, DecodingParams, Embedder, GenerationError, Generator, ModelId,
    OutcomeClassifier, OutcomeLabel, Prompt, ServiceError,
};
use tracing::{debug, info, warn};

use crate::model_server::{ModelServerClient, ModelServerGenerator};
use crate::openai_compat::{LlmClassifier, OpenAiChatGenerator, OpenAiCompatClient, OpenAiEmbedder};

/// Candidates and decoding parameters for one route.
pub struct RouteTable {
    candidates: Vec<Arc<dyn Generator>>,
    params: DecodingParams,
}

impl RouteTable {
    pub fn new(params: DecodingParams) -> Self {
        Self {
            candidates: Vec::new(),
            params,
        }
    }

    /// Append a candidate; earlier candidates are preferred.
    pub fn candidate(mut self, generator: Arc<dyn Generator>) -> Self {
        self.candidates.push(generator);
        self
    }

    pub fn params(&self) -> &DecodingParams {
        &self.params
    }

    pub fn models(&self) -> Vec<ModelId> {
        self.candidates.iter().map(|g| g.model_id().clone()).collect()
    }
}

/// The router's decision for one request.
#[derive(Clone)]
pub struct RouteDecision {
    pub route: OutcomeLabel,
    pub generator: Arc<dyn Generator>,
    pub params: DecodingParams,
    /// True when the preferred model for the route was skipped, either
    /// before generation or because it reported itself unavailable.
    pub fallback_used: bool,
    /// Models checked, in order, including the chosen one.
    pub tried: Vec<ModelId>,
}

/// Generated text plus the decision that produced it.
#[derive(Debug, Clone)]
pub struct Routed {
    pub decision: RouteDecision,
    pub text: String,
}

impl RouteDecision {
    pub fn model_id(&self) -> &ModelId {
        self.generator.model_id()
    }
}

impl std::fmt::Debug for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDecision")
            .field("route", &self.route)
            .field("model", self.generator.model_id())
            .field("params", &self.params)
            .field("fallback_used", &self.fallback_used)
            .field("tried", &self.tried)
            .finish()
    }
}

pub struct ModelRouter {
    rejection: RouteTable,
    registration: RouteTable,
}

impl ModelRouter {
    pub fn new(rejection: RouteTable, registration: RouteTable) -> Self {
        Self {
            rejection,
            registration,
        }
    }

    /// The usual two-model layout: rejection prefers `specialized` and falls
    /// back to `general`; registration uses `general` only.
    pub fn specialized_with_general(
        specialized: Arc<dyn Generator>,
        general: Arc<dyn Generator>,
        rejection_params: DecodingParams,
        registration_params: DecodingParams,
    ) -> Self {
        Self::new(
            RouteTable::new(rejection_params)
                .candidate(specialized)
                .candidate(general.clone()),
            RouteTable::new(registration_params).candidate(general),
        )
    }

    /// Route for a classification. No classification means registration.
    pub fn route_for(classification: Option<&ClassificationResult>) -> OutcomeLabel {
        classification
            .map(|c| c.label)
            .unwrap_or(OutcomeLabel::Registration)
    }

    pub fn table(&self, route: OutcomeLabel) -> &RouteTable {
        match route {
            OutcomeLabel::Rejection => &self.rejection,
            OutcomeLabel::Registration => &self.registration,
        }
    }

    /// Generate with the first candidate of the route that answers.
    ///
    /// A candidate is skipped when its availability check fails, or when
    /// `generate` itself reports `ModelUnavailable` and another candidate
    /// remains. Any other generation error ends the request.
    pub async fn generate(
        &self,
        classification: Option<&ClassificationResult>,
        prompt: &Prompt,
    ) -> Result<Routed, GenerationError> {
        let route = Self::route_for(classification);
        let table = self.table(route);
        let last = table.candidates.len().saturating_sub(1);
        let mut tried = Vec::with_capacity(table.candidates.len());

        for (i, generator) in table.candidates.iter().enumerate() {
            let model = generator.model_id().clone();
            tried.push(model.clone());

            if !generator.is_available().await {
                warn!(route = %route, model = %model, "Router: model unavailable");
                continue;
            }

            if i > 0 {
                warn!(route = %route, model = %model, "Router: preferred model unavailable, using fallback");
            } else {
                debug!(route = %route, model = %model, "Router: selected model");
            }

            match generator.generate(prompt, &table.params).await {
                Ok(text) => {
                    return Ok(Routed {
                        decision: RouteDecision {
                            route,
                            generator: generator.clone(),
                            params: table.params.clone(),
                            fallback_used: i > 0,
                            tried,
                        },
                        text,
                    });
                }
                Err(GenerationError::ModelUnavailable(reason)) if i < last => {
                    warn!(route = %route, model = %model, %reason, "Router: model unavailable at generation, trying next candidate");
                }
                Err(e) => {
                    warn!(route = %route, model = %model, error = %e, "Router: generation failed");
                    return Err(e);
                }
            }
        }

        let names: Vec<_> = tried.iter().map(|m| m.to_string()).collect();
        Err(GenerationError::ModelUnavailable(if names.is_empty() {
            format!("no models configured for {route}")
        } else {
            names.join(", ")
        }))
    }

    /// Every distinct generator, for health reporting.
    pub fn generators(&self) -> Vec<Arc<dyn Generator>> {
        let mut seen: Vec<Arc<dyn Generator>> = Vec::new();
        for g in self.rejection.candidates.iter().chain(&self.registration.candidates) {
            if !seen.iter().any(|s| s.model_id() == g.model_id()) {
                seen.push(g.clone());
            }
        }
        seen
    }
}

/// Remote service handles built for the configured stack.
pub struct RemoteServices {
    pub embedder: Arc<dyn Embedder>,
    pub classifier: Arc<dyn OutcomeClassifier>,
    pub router: ModelRouter,
}

/// Build the embedder, classifier and router from configuration.
pub fn build_from_config(config: &AppConfig) -> Result<RemoteServices, ServiceError> {
    let routing = &config.routing;

    match config.backend {
        ServiceBackend::ModelServer => {
            let client = Arc::new(ModelServerClient::from_config(&config.model_server)?);
            info!(url = %client.base_url(), "Using model server stack");

            let specialized: Arc<dyn Generator> = Arc::new(ModelServerGenerator::new(
                client.clone(),
                &routing.specialized_model,
            ));
            let general: Arc<dyn Generator> =
                Arc::new(ModelServerGenerator::new(client.clone(), &routing.general_model));

            Ok(RemoteServices {
                embedder: client.clone(),
                classifier: client,
                router: ModelRouter::specialized_with_general(
                    specialized,
                    general,
                    routing.rejection.clone(),
                    routing.registration.clone(),
                ),
            })
        }
        ServiceBackend::Openai => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ServiceError::NotConfigured(
                    "backend 'openai' needs PATENTRAG_API_KEY or OPENAI_API_KEY".into(),
                )
            })?;
            let openai = &config.openai;
            let client = Arc::new(OpenAiCompatClient::new("openai", &openai.api_url, api_key)?);
            info!(url = %client.base_url(), model = %openai.chat_model, "Using OpenAI-compatible stack");

            let chat: Arc<dyn Generator> =
                Arc::new(OpenAiChatGenerator::new(client.clone(), &openai.chat_model));

            Ok(RemoteServices {
                embedder: Arc::new(
                    OpenAiEmbedder::new(client.clone(), &openai.embedding_model)
                        .with_dimensions(openai.embedding_dimensions),
                ),
                classifier: Arc::new(LlmClassifier::new(client, &openai.classifier_model)),
                router: ModelRouter::new(
                    RouteTable::new(routing.rejection.clone()).candidate(chat.clone()),
                    RouteTable::new(routing.registration.clone()).candidate(chat),
                ),
            })
        }
    }
}
