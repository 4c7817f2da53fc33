//! Remote model clients for patentrag.
//!
//! Every client implements the core service traits (`Embedder`,
//! `OutcomeClassifier`, `Generator`). The router picks the generator for a
//! request from the classification outcome.

mod http;
pub mod model_server;
pub mod openai_compat;
pub mod router;

pub use http::STATUS_INSUFFICIENT_STORAGE;
pub use model_server::{HealthResponse, ModelServerClient, ModelServerGenerator};
pub use openai_compat::{LlmClassifier, OpenAiChatGenerator, OpenAiCompatClient, OpenAiEmbedder};
pub use router::{ModelRouter, RemoteServices, RouteDecision, RouteTable, Routed, build_from_config};
