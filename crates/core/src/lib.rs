//! # patentrag core
//!
//! Domain types, service traits, and error definitions for the patent
//! question-answering pipeline. This crate has no framework dependencies;
//! it defines the model that every other crate implements against.
//!
//! Every remote collaborator (embedder, classifier, generator, vector index)
//! is a trait here. Implementations live in their own crates and are
//! injected by the process bootstrap, which keeps the pipeline testable with
//! scripted doubles.

pub mod citation;
pub mod classification;
pub mod conversation;
pub mod document;
pub mod error;
pub mod memory;
pub mod provider;
pub mod retriever;

pub use citation::{CitationEntry, CitationMapping, citation_label};
pub use classification::{ClassificationResult, OutcomeLabel};
pub use conversation::{ConversationTurn, Role};
pub use document::{Document, RetrievedHit};
pub use error::{
    ClassificationError, GenerationError, RetrievalError, ServiceError, ValidationWarning,
};
pub use memory::{MemoryContext, MemoryFact};
pub use provider::{DecodingParams, Embedder, Generator, ModelId, OutcomeClassifier, Prompt};
pub use retriever::VectorRetriever;
