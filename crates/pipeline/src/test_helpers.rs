//! Scripted service doubles for pipeline tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use patentrag_core::{
    ClassificationError, ClassificationResult, DecodingParams, Document, Embedder,
    GenerationError, Generator, ModelId, OutcomeClassifier, OutcomeLabel, Prompt, ServiceError,
};
use patentrag_providers::ModelRouter;
use patentrag_retrieval::{InMemoryIndex, RetrieverChain};

/// Returns the same vector for every input.
pub struct StaticEmbedder {
    vector: Vec<f32>,
    call_count: Mutex<usize>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            call_count: Mutex::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    fn name(&self) -> &str {
        "static_mock"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(self.vector.clone())
    }
}

/// Always fails to embed.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::Network("connection refused".into()))
    }
}

/// Never finishes embedding.
pub struct HangingEmbedder;

#[async_trait]
impl Embedder for HangingEmbedder {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ServiceError::Network("unreachable".into()))
    }
}

/// Returns one scripted classification and records its inputs.
pub struct ScriptedClassifier {
    result: Result<ClassificationResult, ClassificationError>,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new(result: Result<ClassificationResult, ClassificationError>) -> Self {
        Self {
            result,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(label: OutcomeLabel, confidence: f32) -> Self {
        Self::new(Ok(ClassificationResult::new(label, confidence)))
    }

    pub fn unavailable() -> Self {
        Self::new(Err(ClassificationError::Unavailable("backend down".into())))
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassificationError> {
        self.inputs.lock().unwrap().push(text.to_string());
        self.result.clone()
    }
}

/// Never answers.
pub struct HangingClassifier;

#[async_trait]
impl OutcomeClassifier for HangingClassifier {
    fn name(&self) -> &str {
        "hanging_mock"
    }

    async fn classify(&self, _text: &str) -> Result<ClassificationResult, ClassificationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ClassificationError::Unavailable("unreachable".into()))
    }
}

/// Generator with a scripted reply and availability flag.
pub struct ScriptedGenerator {
    model: ModelId,
    available: bool,
    reply: Result<String, GenerationError>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<(Prompt, DecodingParams)>>,
}

impl ScriptedGenerator {
    pub fn new(model: &str, reply: &str) -> Self {
        Self {
            model: ModelId::new(model),
            available: true,
            reply: Ok(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(model: &str, error: GenerationError) -> Self {
        Self {
            reply: Err(error),
            ..Self::new(model, "")
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(Prompt, DecodingParams)> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_id(&self) -> &ModelId {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.clone(), params.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// Router over a specialized and a general scripted generator.
pub fn router(specialized: Arc<ScriptedGenerator>, general: Arc<ScriptedGenerator>) -> ModelRouter {
    ModelRouter::specialized_with_general(
        specialized,
        general,
        DecodingParams::rejection(),
        DecodingParams::registration(),
    )
}

/// Three board-game documents in a two-dimensional space.
pub fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "10-2019-0001111",
            "주사위 보드게임 장치",
            "주사위와 말을 이용하여 진행하는 보드게임 장치에 관한 것이다.",
        )
        .with_embedding(vec![1.0, 0.0]),
        Document::new(
            "10-2020-0002222",
            "카드 셔플 장치",
            "카드를 자동으로 섞는 장치에 관한 것이다.",
        )
        .with_embedding(vec![0.8, 0.6]),
        Document::new(
            "10-2021-0003333",
            "접이식 게임판",
            "접을 수 있는 게임판에 관한 것이다.",
        )
        .with_embedding(vec![0.0, 1.0]),
    ]
}

/// A chain over an in-memory index holding [`corpus`].
pub async fn memory_chain() -> RetrieverChain {
    let index = InMemoryIndex::from_documents(corpus())
        .await
        .expect("corpus loads");
    RetrieverChain::new().add(Arc::new(index), Duration::from_secs(5))
}
