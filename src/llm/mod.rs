//! LLM module - model client abstraction
//!
//! Provides the [`ModelClient`] trait, an OpenAI-compatible HTTP client and a
//! scripted client for tests and offline runs.

pub mod openai;
pub mod scripted;
pub mod traits;

pub use openai::OpenAiClient;
pub use scripted::ScriptedModel;
pub use traits::ModelClient;
