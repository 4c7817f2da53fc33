//! Context preparation for the generator.
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | Memory extraction | Windowed conversation history | Facts + topics |
//! | Prompt composition | Query, hits, classification, memory, citations | System + user sections |
//! | Token estimation | Composed prompt | Approximate token count |

pub mod composer;
pub mod memory;
pub mod token;

pub use composer::{POLICY_PREAMBLE, PromptComposer, truncate_chars};
pub use memory::{CaptureWindow, FactPattern, MemoryExtractor, PATTERN_TABLE, PATTERN_TABLE_VERSION};
