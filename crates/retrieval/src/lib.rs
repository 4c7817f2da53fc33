//! Vector Retriever backends for patentrag.

pub mod chain;
pub mod in_memory;
pub mod noop;
pub mod vector;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use chain::{RetrievalOutcome, RetrieverChain};
pub use in_memory::InMemoryIndex;
pub use noop::NoopRetriever;
pub use vector::{cosine_similarity, to_pgvector_literal, vector_search};

#[cfg(feature = "postgres")]
pub use postgres::PgVectorRetriever;
