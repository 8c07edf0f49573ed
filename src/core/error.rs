//! Custom error types for Chico
//!
//! Provides a unified error handling system across all modules.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Chico operations
#[derive(Error, Debug)]
pub enum ChicoError {
    /// The language-model service could not produce a response
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A registered tool failed (bad arguments or handler error)
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The model kept requesting tools past the configured bound
    #[error("Iteration limit of {0} exceeded without a final answer")]
    IterationLimitExceeded(usize),

    /// The command was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// A model call or tool execution ran past its deadline
    #[error("{operation} timed out after {timeout:?}")]
    DeadlineExceeded {
        operation: String,
        timeout: Duration,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Events provider errors
    #[error("Events error: {0}")]
    Events(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for Chico operations
pub type Result<T> = std::result::Result<T, ChicoError>;

impl ChicoError {
    /// Create a model-unavailable error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an events provider error
    pub fn events(msg: impl Into<String>) -> Self {
        Self::Events(msg.into())
    }

    /// Create a deadline error for the named operation
    pub fn deadline(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
            timeout,
        }
    }

    /// Whether the orchestration loop recovers from this error locally
    /// instead of failing the command.
    pub fn is_tool_error(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::ToolExecution { .. })
    }

    /// Message suitable for showing to the model or the end user.
    ///
    /// Tool errors drop the tool name prefix since callers already attach it.
    pub fn sanitized(&self) -> String {
        match self {
            Self::ToolExecution { message, .. } => message.clone(),
            Self::UnknownTool(name) => format!("no tool named '{}' is registered", name),
            other => other.to_string(),
        }
    }
}
