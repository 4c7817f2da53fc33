//! The patent question-answering pipeline.
//!
//! A request flows through:
//!
//! 1. **Embed** the query through the configured embedder
//! 2. **Retrieve** similar documents from the retriever chain
//! 3. **Classify** the top-ranked document as rejection- or registration-leaning
//! 4. **Extract memory** from the recent conversation history
//! 5. **Compose** a prompt with numbered, citation-labelled documents
//! 6. **Route** to the specialized or general model and generate
//! 7. **Validate** the output: allow-list, closing clause, citation check
//!
//! Every remote collaborator is injected, so tests drive the pipeline with
//! scripted doubles.

pub mod context;
pub mod error;
pub mod response;
pub mod runner;
pub mod validator;

#[cfg(test)]
mod test_helpers;

pub use context::{MemoryExtractor, PromptComposer};
pub use error::PipelineError;
pub use response::{PipelineResponse, ResponseMetadata, RetrievalSummary};
pub use runner::{ComponentHealth, PatentPipeline};
pub use validator::{CLOSING_CLAUSE, NO_DOCUMENTS_NOTICE, ResponseValidator, ValidatedAnswer};
