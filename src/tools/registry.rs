//! Tool registry - manages and dispatches tool calls
//!
//! Maps tool names to a definition (name, description, parameter schema) and
//! a handler. Arguments are parsed and checked against the schema before a
//! handler ever sees them, and handler failures come back as
//! [`ChicoError::ToolExecution`] instead of unwinding the caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{ChicoError, Result, ToolCall, ToolDefinition, ToolOutput};

/// A callable the model may invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool with already-validated arguments
    async fn execute(&self, args: Value, cancel: CancellationToken) -> Result<ToolOutput>;
}

/// Adapter for synchronous closures
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(Value) -> Result<ToolOutput> + Send + Sync,
{
    async fn execute(&self, args: Value, _cancel: CancellationToken) -> Result<ToolOutput> {
        (self.0)(args)
    }
}

/// Adapter for async closures
pub struct AsyncFnTool<F>(pub F);

#[async_trait]
impl<F, Fut> Tool for AsyncFnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput>> + Send,
{
    async fn execute(&self, args: Value, _cancel: CancellationToken) -> Result<ToolOutput> {
        (self.0)(args).await
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn Tool>,
}

/// Registry of available tools for one session
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    /// Deadline applied to every execution
    timeout: Option<Duration>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a deadline to every tool execution
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool, replacing any previous tool with the same name
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn Tool>) {
        let name = definition.name().to_string();
        if self.tools.contains_key(&name) {
            debug!(tool = %name, "replacing registered tool");
        }
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                handler,
            },
        );
    }

    /// Register a synchronous closure
    pub fn register_fn<F>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(Value) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        self.register(definition, Arc::new(FnTool(f)));
    }

    /// Register an async closure
    pub fn register_async<F, Fut>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        self.register(definition, Arc::new(AsyncFnTool(f)));
    }

    /// Remove a tool, returning whether it was registered
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool definition by name
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Catalog handed to the model client, sorted by name
    pub fn list_tool_schemas(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.name().cmp(b.name()));
        defs
    }

    /// Execute a tool call
    ///
    /// Returns `UnknownTool` for unregistered names and `ToolExecution` for bad
    /// arguments, handler errors and timeouts. Cancellation is reported as
    /// `Cancelled`.
    pub async fn execute(&self, tool_call: &ToolCall, cancel: &CancellationToken) -> Result<ToolOutput> {
        let tool = self
            .tools
            .get(&tool_call.name)
            .ok_or_else(|| ChicoError::UnknownTool(tool_call.name.clone()))?;

        let args = tool_call.parse_arguments()?;
        validate_arguments(&tool.definition.function.parameters, &args)
            .map_err(|msg| ChicoError::tool(&tool_call.name, msg))?;

        let run = tool.handler.execute(args, cancel.child_token());
        let outcome = match self.timeout {
            Some(timeout) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChicoError::Cancelled),
                res = tokio::time::timeout(timeout, run) => res.map_err(|_| {
                    ChicoError::tool(&tool_call.name, format!("timed out after {:?}", timeout))
                })?,
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChicoError::Cancelled),
                res = run => res,
            },
        };

        outcome.map_err(|e| match e {
            ChicoError::ToolExecution { .. } | ChicoError::Cancelled => e,
            other => ChicoError::tool(&tool_call.name, other.to_string()),
        })
    }
}

/// Check arguments against a JSON-Schema subset: object shape, `required`,
/// primitive `type` of declared properties, and `additionalProperties: false`.
pub fn validate_arguments(schema: &Value, args: &Value) -> std::result::Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err(format!("arguments must be a JSON object, got {}", type_name(args)));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if object.get(key).map_or(true, Value::is_null) {
                return Err(format!("missing required argument '{}'", key));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);

    for (key, value) in object {
        let declared = properties.and_then(|p| p.get(key));
        match declared {
            Some(prop) => {
                if let Some(expected) = prop.get("type").and_then(Value::as_str) {
                    if !value.is_null() && !matches_type(expected, value) {
                        return Err(format!(
                            "argument '{}' must be of type {}, got {}",
                            key,
                            expected,
                            type_name(value)
                        ));
                    }
                }
            }
            None => {
                if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                    return Err(format!("unexpected argument '{}'", key));
                }
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
