//! End-to-end integration tests for the patentrag pipeline.
//!
//! These tests wire the real retriever chain, memory extractor, prompt
//! composer, router and validator together, with scripted doubles standing
//! in for the remote model services.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use patentrag_core::conversation::history_from_pairs;
use patentrag_core::{
    CitationMapping, ClassificationError, ClassificationResult, ConversationTurn, DecodingParams,
    Document, Embedder, GenerationError, Generator, ModelId, OutcomeClassifier, OutcomeLabel,
    Prompt, RetrievalError, RetrievedHit, Role, ServiceError, VectorRetriever,
};
use patentrag_pipeline::validator::{collapse_whitespace, enforce_closing_clause, filter_allowed};
use patentrag_pipeline::{
    CLOSING_CLAUSE, MemoryExtractor, NO_DOCUMENTS_NOTICE, PatentPipeline, PipelineError,
    ResponseValidator,
};
use patentrag_providers::ModelRouter;
use patentrag_retrieval::{InMemoryIndex, NoopRetriever, RetrieverChain};

// ── Mock services ────────────────────────────────────────────────────────

struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    fn name(&self) -> &str {
        "e2e_embedder"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(self.0.clone())
    }
}

struct MockClassifier {
    result: Result<ClassificationResult, ClassificationError>,
    calls: Mutex<usize>,
}

impl MockClassifier {
    fn returning(label: OutcomeLabel, confidence: f32) -> Self {
        Self {
            result: Ok(ClassificationResult::new(label, confidence)),
            calls: Mutex::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            result: Err(ClassificationError::Unavailable("classifier offline".into())),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl OutcomeClassifier for MockClassifier {
    fn name(&self) -> &str {
        "e2e_classifier"
    }

    async fn classify(&self, _text: &str) -> Result<ClassificationResult, ClassificationError> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone()
    }
}

/// What a scripted generator replies with.
enum Reply {
    Text(&'static str),
    /// Repeat the first memory fact found in the prompt.
    EchoMemory,
}

struct ScriptedGenerator {
    model: ModelId,
    available: bool,
    reply: Reply,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    fn new(model: &str, reply: Reply) -> Self {
        Self {
            model: ModelId::new(model),
            available: true,
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn text(model: &str, text: &'static str) -> Self {
        Self::new(model, Reply::Text(text))
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_prompt(&self) -> Prompt {
        self.prompts.lock().unwrap().last().cloned().unwrap()
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
        _params: &DecodingParams,
    ) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match &self.reply {
            Reply::Text(text) => Ok((*text).to_string()),
            Reply::EchoMemory => {
                let fact = prompt
                    .user
                    .lines()
                    .skip_while(|l| *l != "[대화 기억]")
                    .nth(1)
                    .and_then(|l| l.strip_prefix("- "))
                    .and_then(|l| l.split(" (").next())
                    .unwrap_or("nothing");
                Ok(format!("이전 대화에서 {fact} 라고 말씀하셨습니다."))
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// A backend that is always down.
struct DownRetriever;

#[async_trait]
impl VectorRetriever for DownRetriever {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn search(&self, _q: &[f32], _k: usize) -> Result<Vec<RetrievedHit>, RetrievalError> {
        Err(RetrievalError::unavailable("postgres", "connection refused"))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "10-2019-0001111",
            "주사위 보드게임 장치",
            "주사위와 말을 이용하여 진행하는 보드게임 장치에 관한 것이다.",
        )
        .with_embedding(vec![1.0, 0.0, 0.0]),
        Document::new(
            "10-2020-0002222",
            "카드 셔플 장치",
            "카드를 자동으로 섞는 장치에 관한 것이다.",
        )
        .with_embedding(vec![0.6, 0.8, 0.0]),
        Document::new(
            "10-2021-0003333",
            "접이식 게임판",
            "접을 수 있는 게임판에 관한 것이다.",
        )
        .with_embedding(vec![0.0, 0.0, 1.0]),
    ]
}

async fn corpus_chain() -> RetrieverChain {
    let index = InMemoryIndex::from_documents(corpus()).await.unwrap();
    RetrieverChain::new().add(Arc::new(index), Duration::from_secs(5))
}

fn empty_chain() -> RetrieverChain {
    RetrieverChain::new().add(Arc::new(NoopRetriever), Duration::from_secs(5))
}

fn router(specialized: &Arc<ScriptedGenerator>, general: &Arc<ScriptedGenerator>) -> ModelRouter {
    ModelRouter::specialized_with_general(
        specialized.clone(),
        general.clone(),
        DecodingParams::rejection(),
        DecodingParams::registration(),
    )
}

fn pipeline(
    chain: RetrieverChain,
    classifier: Arc<MockClassifier>,
    specialized: &Arc<ScriptedGenerator>,
    general: &Arc<ScriptedGenerator>,
) -> PatentPipeline {
    PatentPipeline::new(
        Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
        chain,
        classifier,
        router(specialized, general),
    )
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_memory_fact_reaches_the_answer() {
    let specialized = Arc::new(ScriptedGenerator::text("sllm", "unused"));
    let general = Arc::new(ScriptedGenerator::new("base_model", Reply::EchoMemory));
    let classifier = Arc::new(MockClassifier::returning(OutcomeLabel::Rejection, 0.9));
    let pipeline = pipeline(empty_chain(), classifier.clone(), &specialized, &general);

    let history = vec![ConversationTurn::user("I'm searching board-game patents", 0)];
    let response = pipeline
        .answer("what was I searching for?", &history)
        .await
        .unwrap();

    let facts = &response.metadata.memory.facts;
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].fact_type, "interest");
    assert_eq!(facts[0].content, "searching board-game patents");
    assert_eq!(facts[0].turns_ago, 1);

    let prompt = general.last_prompt();
    assert!(prompt.user.contains("searching board-game patents (1 turns ago)"));

    assert!(response.answer.contains("searching board-game patents"));
    assert!(response.answer.starts_with(NO_DOCUMENTS_NOTICE));
    assert_eq!(classifier.calls(), 0);
    assert!(response.metadata.citations.is_empty());
}

#[tokio::test]
async fn scenario_b_rejection_routes_to_specialized_model() {
    let specialized = Arc::new(ScriptedGenerator::text(
        "sllm",
        "본 발명은 CITATION_1(출원번호 10-2019-0001111)과 구성이 동일하여 신규성이 부정됩니다",
    ));
    let general = Arc::new(ScriptedGenerator::text("base_model", "unused"));
    let classifier = Arc::new(MockClassifier::returning(OutcomeLabel::Rejection, 0.92));
    let pipeline = pipeline(corpus_chain().await, classifier, &specialized, &general);

    let response = pipeline
        .answer("주사위를 이용한 보드게임 장치가 특허를 받을 수 있나요?", &[])
        .await
        .unwrap();

    assert_eq!(response.metadata.route, OutcomeLabel::Rejection);
    assert_eq!(response.metadata.model.as_str(), "sllm");
    assert_eq!(specialized.calls(), 1);
    assert_eq!(general.calls(), 0);
    assert!(response.answer.ends_with(CLOSING_CLAUSE));
    assert!(response.metadata.warnings.is_empty());

    let classification = response.metadata.classification.unwrap();
    assert!((classification.confidence - 0.92).abs() < 1e-6);
}

#[tokio::test]
async fn scenario_c_classifier_down_uses_general_model() {
    let specialized = Arc::new(ScriptedGenerator::text("sllm", "unused"));
    let general = Arc::new(ScriptedGenerator::text(
        "base_model",
        "CITATION_2(출원번호 10-2020-0002222)와 달리 주사위 구성이 있어 등록 가능성이 있습니다.",
    ));
    let classifier = Arc::new(MockClassifier::unavailable());
    let pipeline = pipeline(corpus_chain().await, classifier.clone(), &specialized, &general);

    let response = pipeline.answer("보드게임 장치", &[]).await.unwrap();

    assert_eq!(classifier.calls(), 1);
    assert_eq!(response.metadata.route, OutcomeLabel::Registration);
    assert_eq!(response.metadata.model.as_str(), "base_model");
    assert!(response.metadata.classification_fallback);
    assert_eq!(specialized.calls(), 0);
    assert!(!response.answer.ends_with(CLOSING_CLAUSE));
}

#[tokio::test]
async fn scenario_d_mixed_script_output_is_cleaned() {
    let specialized = Arc::new(ScriptedGenerator::text("sllm", "unused"));
    let general = Arc::new(ScriptedGenerator::text(
        "base_model",
        "본 발명은 特許 CITATION_1과 유사하지만 の 차이가 있습니다.\n\n등록 가능성이 있습니다 😀",
    ));
    let classifier = Arc::new(MockClassifier::returning(OutcomeLabel::Registration, 0.8));
    let pipeline = pipeline(corpus_chain().await, classifier, &specialized, &general);

    let response = pipeline.answer("보드게임", &[]).await.unwrap();

    assert_eq!(
        response.answer,
        "본 발명은 CITATION_1과 유사하지만 차이가 있습니다. 등록 가능성이 있습니다"
    );
    assert!(!response.answer.contains("  "));
    assert!(!response.answer.contains('\n'));
}

// ── Degradation paths ────────────────────────────────────────────────────

#[tokio::test]
async fn retrieval_falls_back_to_next_backend() {
    let index = InMemoryIndex::from_documents(corpus()).await.unwrap();
    let chain = RetrieverChain::new()
        .with_retries(1)
        .add(Arc::new(DownRetriever), Duration::from_secs(5))
        .add(Arc::new(index), Duration::from_secs(5));

    let specialized = Arc::new(ScriptedGenerator::text("sllm", "unused"));
    let general = Arc::new(ScriptedGenerator::text("base_model", "등록 가능성이 있습니다."));
    let classifier = Arc::new(MockClassifier::returning(OutcomeLabel::Registration, 0.8));
    let pipeline = pipeline(chain, classifier, &specialized, &general);

    let response = pipeline.answer("보드게임", &[]).await.unwrap();
    let retrieval = &response.metadata.retrieval;

    assert_eq!(retrieval.backend_used.as_deref(), Some("memory"));
    assert_eq!(retrieval.attempted, vec!["postgres", "postgres", "memory"]);
    assert!(retrieval.fallback_used);
    assert!(!retrieval.degraded);
    assert_eq!(response.metadata.citations.len(), 3);
}

#[tokio::test]
async fn all_backends_down_answers_without_documents() {
    let chain = RetrieverChain::new()
        .with_retries(0)
        .add(Arc::new(DownRetriever), Duration::from_secs(5));

    let specialized = Arc::new(ScriptedGenerator::text("sllm", "unused"));
    let general = Arc::new(ScriptedGenerator::text(
        "base_model",
        "CITATION_1(출원번호 10-0000-0000000)을 참고하면 등록 가능성이 있습니다.",
    ));
    let classifier = Arc::new(MockClassifier::returning(OutcomeLabel::Rejection, 0.9));
    let pipeline = pipeline(chain, classifier, &specialized, &general);

    let response = pipeline.answer("보드게임", &[]).await.unwrap();

    assert!(response.metadata.retrieval.degraded);
    assert!(response.answer.starts_with(NO_DOCUMENTS_NOTICE));
    assert!(!response.answer.contains("CITATION_"));
    assert_eq!(response.metadata.route, OutcomeLabel::Registration);
}

#[tokio::test]
async fn generation_failure_returns_explicit_error() {
    struct OutOfMemory(ModelId);

    #[async_trait]
    impl Generator for OutOfMemory {
        fn model_id(&self) -> &ModelId {
            &self.0
        }

        async fn generate(
            &self,
            _prompt: &Prompt,
            _params: &DecodingParams,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::ResourceExhausted {
                model: self.0.to_string(),
            })
        }
    }

    let general = Arc::new(OutOfMemory(ModelId::new("base_model")));
    let router = ModelRouter::specialized_with_general(
        general.clone(),
        general,
        DecodingParams::rejection(),
        DecodingParams::registration(),
    );
    let pipeline = PatentPipeline::new(
        Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
        corpus_chain().await,
        Arc::new(MockClassifier::returning(OutcomeLabel::Registration, 0.6)),
        router,
    );

    let err = pipeline.answer("보드게임", &[]).await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
    assert!(err.is_retryable());
    assert!(!err.user_message().is_empty());
}

// ── Properties ───────────────────────────────────────────────────────────

#[tokio::test]
async fn citation_labels_are_contiguous_in_rank_order() {
    let index = InMemoryIndex::from_documents(corpus()).await.unwrap();
    let hits = index.search(&[1.0, 0.0, 0.0], 3).await.unwrap();
    let mapping = CitationMapping::from_hits(&hits);

    let labels: Vec<_> = mapping.entries().iter().map(|e| e.label.clone()).collect();
    assert_eq!(labels, vec!["CITATION_1", "CITATION_2", "CITATION_3"]);
    let ids: Vec<_> = mapping.entries().iter().map(|e| e.doc_id.as_str()).collect();
    let hit_ids: Vec<_> = hits.iter().map(|h| h.document.doc_id.as_str()).collect();
    assert_eq!(ids, hit_ids);
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[test]
fn closing_clause_application_is_idempotent() {
    for text in ["진보성이 없습니다", "진보성이 없습니다.", "", CLOSING_CLAUSE] {
        let once = enforce_closing_clause(text);
        assert!(once.ends_with(CLOSING_CLAUSE));
        assert_eq!(enforce_closing_clause(&once), once);
    }
}

#[test]
fn memory_extraction_is_pure() {
    let history = history_from_pairs(vec![
        (Role::User, "I'm interested in folding game boards"),
        (Role::Assistant, "알겠습니다."),
        (Role::User, "보드게임 관련 특허를 찾고 있어요"),
        (Role::Assistant, "네."),
        (Role::User, "신규성이 궁금합니다"),
    ]);
    let extractor = MemoryExtractor::new();
    let first = extractor.extract(&history);
    let second = extractor.extract(&history);
    assert_eq!(first, second);
    assert_eq!(first.facts.len(), 2);
    assert!(first.topics.contains("novelty"));
}

#[test]
fn validator_round_trip_is_byte_identical() {
    let validator = ResponseValidator::new();
    let hits = patentrag_core::document::rank_hits(
        corpus().into_iter().map(|d| (d, 0.5)),
    );
    let mapping = CitationMapping::from_hits(&hits);
    let rejection = ClassificationResult::new(OutcomeLabel::Rejection, 0.92);

    let clean = validator
        .finalize("CITATION_3과 비교하면 진보성이 없습니다", Some(&rejection), &mapping)
        .text;
    let again = validator.finalize(&clean, Some(&rejection), &mapping).text;
    assert_eq!(clean.as_bytes(), again.as_bytes());

    // Already-clean text is untouched by the individual steps too.
    assert_eq!(collapse_whitespace(&filter_allowed(&clean)), clean);
}
