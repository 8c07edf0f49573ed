//! OpenAI-compatible chat-completions client
//!
//! Async HTTP client for `/chat/completions` with function calling. Works
//! against OpenAI itself and any server that speaks the same wire format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{
    ChicoError, Config, ModelResponse, Result, Role, ToolCall, ToolDefinition, Turn,
};
use crate::llm::traits::ModelClient;

/// OpenAI-compatible API client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

/// Chat request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Message in wire format
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Tool call in wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

/// Function in a wire tool call; arguments are a JSON-encoded string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Chat response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.model.timeout_secs))
            .build()
            .map_err(|e| ChicoError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.model.base_url.trim_end_matches('/').to_string(),
            model: config.model.name.clone(),
            api_key: config.model.api_key.clone(),
            temperature: config.model.temperature,
        })
    }

    /// Convert an internal turn to wire format
    fn to_wire_message(turn: &Turn) -> WireMessage {
        let role = match turn.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool",
        };

        let tool_calls = (!turn.tool_calls.is_empty()).then(|| {
            turn.tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: function_type(),
                    function: WireFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        });

        // Assistant turns that only carry tool calls send a null content
        let content = if turn.role == Role::Assistant && turn.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(turn.content.clone())
        };

        WireMessage {
            role: role.to_string(),
            content,
            tool_calls,
            tool_call_id: turn.tool_call_id.clone(),
            name: turn.tool_name.clone(),
        }
    }

    /// Convert a chat response to a ModelResponse
    fn to_model_response(response: ChatResponse) -> Result<ModelResponse> {
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ChicoError::model("response contained no choices"))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        Ok(ModelResponse {
            text: message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ModelResponse> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);

        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                ChicoError::model(format!("cannot connect to {}", self.base_url))
            } else if e.is_timeout() {
                ChicoError::model("request timed out")
            } else {
                ChicoError::model(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChicoError::model(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChicoError::model(format!("failed to read response: {}", e)))?;

        let chat_response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ChicoError::model(format!("failed to parse response: {}", e)))?;

        if let Some(ref usage) = chat_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model usage"
            );
        }

        Self::to_model_response(chat_response)
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn generate(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<ModelResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages: turns.iter().map(Self::to_wire_message).collect(),
            tools: (!tools.is_empty()).then_some(tools),
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = tools.len(),
            "sending chat request"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChicoError::Cancelled),
            response = self.send(&request) => response,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
