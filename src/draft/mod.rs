//! Draft generation: prompt building, the generator trait and its LLM-backed implementation.

pub mod generator;
pub mod model;
pub mod prompts;

pub use generator::{DraftGenerator, GeneratorConfig, LlmDraftGenerator};
pub use model::Draft;
