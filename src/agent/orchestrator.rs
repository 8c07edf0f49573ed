//! Agent orchestrator
//!
//! The per-session engine that turns one user prompt into a final answer by
//! alternating model calls and tool executions.
//!
//! Tool failures (unknown names, bad arguments, handler errors, tool
//! timeouts) are written back into the conversation as tool results so the
//! model can react to them. Model failures, cancellation and the iteration cap
//! end the command with a failure result. Turns committed before a failure are
//! kept.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agent::conversation::Conversation;
use crate::agent::loop_state::LoopState;
use crate::agent::status::{StatusEnvelope, StatusEvent, StatusPublisher};
use crate::core::config::AgentConfig;
use crate::core::{
    ChicoError, Command, CommandResult, ModelResponse, Result, SessionId, ToolCall,
    ToolDefinition,
};
use crate::llm::ModelClient;
use crate::tools::{Tool, ToolRegistry};

/// Orchestration engine for one session
pub struct Engine {
    engine_id: String,
    session_id: SessionId,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    conversation: Conversation,
    status: StatusPublisher,
    max_iterations: usize,
    model_timeout: Option<Duration>,
    max_tool_error_len: usize,
}

impl Engine {
    /// Create an engine with an empty conversation and tool catalog
    pub fn new(session_id: SessionId, model: Arc<dyn ModelClient>, config: &AgentConfig) -> Self {
        Self {
            engine_id: uuid::Uuid::new_v4().to_string(),
            status: StatusPublisher::new(session_id.clone()),
            session_id,
            model,
            tools: ToolRegistry::new().with_timeout(config.tool_timeout()),
            conversation: Conversation::new(),
            max_iterations: config.max_iterations.max(1),
            model_timeout: config.model_timeout(),
            max_tool_error_len: config.max_tool_error_len,
        }
    }

    /// Install a system prompt at construction time
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.set_system_prompt(prompt);
        self
    }

    /// Set or replace the system prompt
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.conversation.set_system_prompt(prompt);
    }

    /// Register a tool for this session
    pub fn register_tool(&mut self, definition: ToolDefinition, handler: Arc<dyn Tool>) {
        info!(session = %self.session_id, tool = %definition.name(), "tool registered");
        self.tools.register(definition, handler);
    }

    /// Clear conversation history, system prompt included
    pub fn clear_context(&mut self) {
        self.conversation.clear();
    }

    /// Receive status events for this session
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEnvelope> {
        self.status.subscribe()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Process a command to completion
    pub async fn handle_command(&mut self, command: &Command) -> CommandResult {
        self.handle_command_with_cancel(command, &CancellationToken::new())
            .await
    }

    /// Process a command, aborting at the next suspension point once `cancel`
    /// fires
    pub async fn handle_command_with_cancel(
        &mut self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> CommandResult {
        if command.session_id != self.session_id {
            warn!(
                expected = %self.session_id,
                got = %command.session_id,
                "command routed to the wrong session"
            );
            return CommandResult::failure(
                command.session_id.clone(),
                format!(
                    "command for session {} sent to session {}",
                    command.session_id, self.session_id
                ),
            );
        }

        match self.run(&command.prompt, cancel).await {
            Ok(answer) => CommandResult::success(self.session_id.clone(), answer),
            Err(e) => {
                error!(session = %self.session_id, error = %e, "command failed");
                self.status.publish(StatusEvent::Failed {
                    error: e.to_string(),
                });
                CommandResult::failure(self.session_id.clone(), e.to_string())
            }
        }
    }

    async fn run(&mut self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        self.conversation.store_user(prompt);

        let mut state = LoopState::new(self.max_iterations);
        debug!(
            session = %self.session_id,
            max_iterations = state.max_iterations,
            "starting command"
        );

        loop {
            if cancel.is_cancelled() {
                state.fail();
                return Err(ChicoError::Cancelled);
            }
            if !state.can_call_model() {
                state.fail();
                return Err(ChicoError::IterationLimitExceeded(state.max_iterations));
            }

            state.begin_model_call();
            let response = match self.call_model(cancel).await {
                Ok(response) => response,
                Err(e) => {
                    state.fail();
                    return Err(e);
                }
            };
            self.conversation.store_assistant(&response);

            if !response.has_tool_calls() {
                state.finish();
                self.status.publish(StatusEvent::Finished);
                info!(
                    session = %self.session_id,
                    model_calls = state.iteration,
                    tool_calls = state.tool_calls_executed,
                    "command finished"
                );
                return Ok(response.text);
            }

            state.begin_tools();
            debug!(
                session = %self.session_id,
                iteration = state.iteration,
                count = response.tool_calls.len(),
                "executing tool calls"
            );

            for (idx, call) in response.tool_calls.iter().enumerate() {
                state.record_tool_call();
                if let Err(e) = self.execute_tool_call(call, cancel).await {
                    // Answer every outstanding call so the history stays well-formed
                    for skipped in &response.tool_calls[idx + 1..] {
                        self.conversation.store_tool_result(
                            &skipped.id,
                            &skipped.name,
                            format!("Tool {} was not executed: {}", skipped.name, e),
                        );
                    }
                    state.fail();
                    return Err(e);
                }
            }
        }
    }

    async fn call_model(&self, cancel: &CancellationToken) -> Result<ModelResponse> {
        let turns = self.conversation.retrieve();
        let schemas = self.tools.list_tool_schemas();

        self.status.publish(StatusEvent::CallingModel);

        let call = self.model.generate(&turns, &schemas, cancel);
        let response = match self.model_timeout {
            Some(timeout) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ChicoError::Cancelled),
                res = tokio::time::timeout(timeout, call) => {
                    res.unwrap_or_else(|_| Err(ChicoError::deadline("model call", timeout)))
                }
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ChicoError::Cancelled),
                res = call => res,
            },
        }?;

        // Tool results are correlated by id, so ids must be unique per response
        if let Some(id) = duplicate_call_id(&response) {
            warn!(session = %self.session_id, call_id = %id, "model repeated a tool call id");
            return Err(ChicoError::model(format!(
                "response repeated tool call id '{}'",
                id
            )));
        }
        Ok(response)
    }

    /// Run one tool call and record its outcome. Only cancellation is returned
    /// as an error; every other failure becomes a tool_result turn.
    async fn execute_tool_call(&mut self, call: &ToolCall, cancel: &CancellationToken) -> Result<()> {
        self.status.publish(StatusEvent::ExecutingTool {
            tool_name: call.name.clone(),
        });

        match self.tools.execute(call, cancel).await {
            Ok(output) => {
                let text = output.into_text();
                self.conversation
                    .store_tool_result(&call.id, &call.name, text.clone());
                self.status.publish(StatusEvent::ToolResult {
                    tool_name: call.name.clone(),
                    result: text,
                });
                Ok(())
            }
            Err(e) if e.is_tool_error() => {
                warn!(
                    session = %self.session_id,
                    tool = %call.name,
                    call_id = %call.id,
                    error = ?e,
                    "tool execution failed"
                );
                let message = truncate(&e.sanitized(), self.max_tool_error_len);
                self.conversation.store_tool_result(
                    &call.id,
                    &call.name,
                    format!("Error executing tool {}: {}", call.name, message),
                );
                Ok(())
            }
            Err(e) => {
                self.conversation.store_tool_result(
                    &call.id,
                    &call.name,
                    format!("Error executing tool {}: {}", call.name, e),
                );
                Err(e)
            }
        }
    }
}

/// First tool call id that appears more than once in a response
fn duplicate_call_id(response: &ModelResponse) -> Option<&str> {
    let mut seen = HashSet::new();
    response
        .tool_calls
        .iter()
        .map(|call| call.id.as_str())
        .find(|id| !seen.insert(*id))
}

/// Truncate to at most `max` characters, marking the cut
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}
