//! Event tool definitions
//!
//! Registers the five event tools the assistant exposes to the model.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::{ChicoError, Result, ToolDefinition, ToolOutput};
use crate::tools::events::service::EventsService;
use crate::tools::ToolRegistry;

/// Names of the tools registered by [`register_event_tools`]
pub const EVENT_TOOL_NAMES: [&str; 5] = [
    "list_events",
    "get_event_details",
    "get_ticket_status",
    "search_events",
    "get_upcoming_events",
];

fn no_params() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn one_string_param(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            name: { "type": "string", "description": description }
        },
        "required": [name]
    })
}

fn string_arg(args: &Value, tool: &str, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ChicoError::tool(tool, format!("missing string argument '{}'", key)))
}

/// Register the event tools backed by `service`
pub fn register_event_tools(registry: &mut ToolRegistry, service: Arc<EventsService>) {
    let svc = service.clone();
    registry.register_async(
        ToolDefinition::function(
            "list_events",
            "List all available events.",
            no_params(),
        ),
        move |_args| {
            let svc = svc.clone();
            async move { svc.list_events().await.map(ToolOutput::from) }
        },
    );

    let svc = service.clone();
    registry.register_async(
        ToolDefinition::function(
            "get_event_details",
            "Get detailed information about a specific event by name.",
            one_string_param("event_name", "The name of the event to get details for."),
        ),
        move |args| {
            let svc = svc.clone();
            async move {
                let name = string_arg(&args, "get_event_details", "event_name")?;
                svc.event_details(&name).await.map(ToolOutput::from)
            }
        },
    );

    let svc = service.clone();
    registry.register_async(
        ToolDefinition::function(
            "get_ticket_status",
            "Get ticket status and availability for a specific event.",
            one_string_param(
                "event_name",
                "The name of the event to check ticket status for.",
            ),
        ),
        move |args| {
            let svc = svc.clone();
            async move {
                let name = string_arg(&args, "get_ticket_status", "event_name")?;
                svc.ticket_status(&name).await.map(ToolOutput::from)
            }
        },
    );

    let svc = service.clone();
    registry.register_async(
        ToolDefinition::function(
            "search_events",
            "Search for events whose name or description match the query.",
            one_string_param("query", "The search query to find matching events."),
        ),
        move |args| {
            let svc = svc.clone();
            async move {
                let query = string_arg(&args, "search_events", "query")?;
                svc.search_events(&query).await.map(ToolOutput::from)
            }
        },
    );

    let svc = service;
    registry.register_async(
        ToolDefinition::function(
            "get_upcoming_events",
            "Get a list of upcoming events, soonest first.",
            no_params(),
        ),
        move |_args| {
            let svc = svc.clone();
            async move {
                svc.upcoming_events(chrono::Utc::now())
                    .await
                    .map(ToolOutput::from)
            }
        },
    );
}
