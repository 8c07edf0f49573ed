//! Scripted model client
//!
//! Replays queued responses in order and records every request. Used by the
//! test suites and for running the agent without network access.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{ChicoError, ModelResponse, Result, ToolDefinition, Turn};
use crate::llm::traits::ModelClient;

struct Scripted {
    delay: Option<Duration>,
    outcome: Result<ModelResponse>,
}

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
}

/// Model client that returns queued responses
pub struct ScriptedModel {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn push_response(&self, response: ModelResponse) -> &Self {
        self.push(None, Ok(response))
    }

    /// Queue a response that is only returned after `delay`
    pub fn push_delayed(&self, delay: Duration, response: ModelResponse) -> &Self {
        self.push(Some(delay), Ok(response))
    }

    /// Queue a failure
    pub fn push_error(&self, error: ChicoError) -> &Self {
        self.push(None, Err(error))
    }

    fn push(&self, delay: Option<Duration>, outcome: Result<ModelResponse>) -> &Self {
        lock(&self.script).push_back(Scripted { delay, outcome });
        self
    }

    /// Every request seen so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<ModelResponse> {
        lock(&self.requests).push(RecordedRequest {
            turns: turns.to_vec(),
            tools: tools.to_vec(),
        });

        let next = lock(&self.script).pop_front();
        let Some(Scripted { delay, outcome }) = next else {
            return Err(ChicoError::model("no scripted response left"));
        };

        if let Some(delay) = delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChicoError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        outcome
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
