//! Model client trait for abstracting different backends
//!
//! The orchestration loop only ever talks to a [`ModelClient`]; swapping the
//! provider (or a scripted client in tests) needs no loop changes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{ModelResponse, Result, ToolDefinition, Turn};

/// One request/response exchange with a language-model service.
///
/// Implementations are stateless with respect to prior calls: the whole
/// conversation is passed in every time. Transport or provider failures are
/// reported as [`crate::ChicoError::ModelUnavailable`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a response for the given turns and tool catalog
    async fn generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<ModelResponse>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<ModelResponse> {
        (**self).generate(turns, tools, cancel).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
