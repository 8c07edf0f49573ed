//! End-to-end tests for the orchestration loop
//!
//! Drives [`Engine`] with a scripted model so every run is deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chico::agent::{Engine, StatusEvent};
use chico::core::config::AgentConfig;
use chico::core::{Command, ModelResponse, Role, SessionId, ToolCall, ToolDefinition, ToolOutput};
use chico::llm::ScriptedModel;
use chico::tools::events::{register_event_tools, Event, EventsProvider, EventsService};
use chico::ChicoError;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const TICKET_PROMPT: &str = "what tickets are left for the Intro Night?";
const TICKET_ANSWER: &str = "There are 12 tickets left for Intro Night.";

/// One event with 40 seats and 28 orders
struct IntroNight;

#[async_trait]
impl EventsProvider for IntroNight {
    async fn list_events(&self) -> chico::Result<Vec<Event>> {
        Ok(vec![Event {
            id: "evt_intro".to_string(),
            name: "Intro Night".to_string(),
            total_capacity: Some(40),
            ..Default::default()
        }])
    }

    async fn order_count(&self, _event_id: &str) -> chico::Result<Option<usize>> {
        Ok(Some(28))
    }
}

fn session() -> SessionId {
    SessionId::for_user("discord", "42")
}

fn agent_config(max_iterations: usize) -> AgentConfig {
    AgentConfig {
        system_prompt: None,
        max_iterations,
        model_timeout_secs: None,
        tool_timeout_secs: None,
        max_tool_error_len: 500,
    }
}

fn event_engine(model: Arc<ScriptedModel>) -> Engine {
    let mut engine =
        Engine::new(session(), model, &agent_config(10)).with_system_prompt("You help with events.");
    let service = Arc::new(EventsService::new(Arc::new(IntroNight)));
    register_event_tools(engine.tools_mut(), service);
    engine
}

fn ticket_call(arguments: &str) -> ModelResponse {
    ModelResponse::tool_calls(vec![ToolCall::new("call_1", "get_ticket_status", arguments)])
}

fn slow_tool(engine: &mut Engine) {
    engine.tools_mut().register_async(
        ToolDefinition::function("slow", "Takes a while", json!({"type": "object"})),
        |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolOutput::from("finally"))
        },
    );
}

#[tokio::test]
async fn test_intro_night_scenario() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ticket_call(r#"{"event_name":"Intro Night"}"#))
        .push_response(ModelResponse::text(TICKET_ANSWER));

    let mut engine = event_engine(model.clone());
    let result = engine
        .handle_command(&Command::new(session(), TICKET_PROMPT).with_route("42", "discord"))
        .await;

    assert!(result.success);
    assert_eq!(result.result.as_deref(), Some(TICKET_ANSWER));
    assert_eq!(result.session_id, session());
    assert_eq!(model.call_count(), 2);

    let turns = engine.conversation().retrieve();
    let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]
    );
    assert_eq!(turns[3].tool_call_id.as_deref(), Some("call_1"));
    assert!(turns[3].content.contains("Tickets remaining: 12"));

    // The second model call sees the tool result and the full catalog
    let second = &model.requests()[1];
    assert_eq!(second.turns.len(), 4);
    assert_eq!(second.turns[3].role, Role::ToolResult);
    assert_eq!(second.tools.len(), 5);
}

#[tokio::test]
async fn test_terminates_after_one_model_call() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_response(ModelResponse::text("Hello!"));

    let mut engine = event_engine(model.clone());
    let result = engine.handle_command(&Command::new(session(), "hi")).await;

    assert!(result.success);
    assert_eq!(model.call_count(), 1);
    assert_eq!(engine.conversation().turns_by_role(Role::Assistant).count(), 1);
}

#[tokio::test]
async fn test_unknown_tool_resilience() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ModelResponse::tool_calls(vec![ToolCall::new(
            "call_9",
            "book_flight",
            "{}",
        )]))
        .push_response(ModelResponse::text("I can't book flights."));

    let mut engine = event_engine(model.clone());
    let result = engine.handle_command(&Command::new(session(), "fly me")).await;

    assert!(result.success);
    assert_eq!(model.call_count(), 2);

    let second = &model.requests()[1];
    let last = second.turns.last().unwrap();
    assert_eq!(last.role, Role::ToolResult);
    assert_eq!(last.tool_call_id.as_deref(), Some("call_9"));
    assert!(last.content.starts_with("Error executing tool book_flight:"));
}

#[tokio::test]
async fn test_missing_argument_becomes_tool_result() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ticket_call("{}"))
        .push_response(ModelResponse::text("Which event?"));

    let mut engine = event_engine(model.clone());
    let result = engine.handle_command(&Command::new(session(), "tickets?")).await;

    assert!(result.success);
    let tool_result = engine
        .conversation()
        .turns_by_role(Role::ToolResult)
        .next()
        .unwrap();
    assert_eq!(
        tool_result.content,
        "Error executing tool get_ticket_status: missing required argument 'event_name'"
    );
}

#[tokio::test]
async fn test_model_failure_is_fatal() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_error(ChicoError::model("connection refused"));

    let mut engine = event_engine(model.clone());
    let result = engine.handle_command(&Command::new(session(), "hi")).await;

    assert!(!result.success);
    assert!(result.result.is_none());
    assert!(result.error.unwrap().contains("connection refused"));
    assert_eq!(engine.conversation().turns_by_role(Role::Assistant).count(), 0);
    // The user turn stays; there is no rollback
    assert_eq!(engine.conversation().turns_by_role(Role::User).count(), 1);
}

#[tokio::test]
async fn test_model_failure_after_tools_keeps_committed_turns() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ticket_call(r#"{"event_name":"Intro Night"}"#))
        .push_error(ChicoError::model("rate limited"));

    let mut engine = event_engine(model);
    let result = engine.handle_command(&Command::new(session(), TICKET_PROMPT)).await;

    assert!(!result.success);
    assert_eq!(engine.conversation().turns_by_role(Role::Assistant).count(), 1);
    assert_eq!(engine.conversation().turns_by_role(Role::ToolResult).count(), 1);
}

#[tokio::test]
async fn test_iteration_limit() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    for _ in 0..5 {
        model.push_response(ticket_call(r#"{"event_name":"Intro Night"}"#));
    }

    let mut engine = Engine::new(session(), model.clone(), &agent_config(3));
    register_event_tools(
        engine.tools_mut(),
        Arc::new(EventsService::new(Arc::new(IntroNight))),
    );
    let result = engine.handle_command(&Command::new(session(), TICKET_PROMPT)).await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Iteration limit of 3 exceeded without a final answer")
    );
    assert_eq!(model.call_count(), 3);
    assert_eq!(model.remaining(), 2);
}

#[tokio::test]
async fn test_status_events_in_order() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ticket_call(r#"{"event_name":"Intro Night"}"#))
        .push_response(ModelResponse::text(TICKET_ANSWER));

    let mut engine = event_engine(model);
    let mut events = engine.subscribe();
    engine.handle_command(&Command::new(session(), TICKET_PROMPT)).await;

    let mut seen = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.session_id, session());
        seen.push(envelope.event);
    }

    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], StatusEvent::CallingModel);
    assert_eq!(
        seen[1],
        StatusEvent::ExecutingTool {
            tool_name: "get_ticket_status".to_string()
        }
    );
    assert!(matches!(
        &seen[2],
        StatusEvent::ToolResult { tool_name, result }
            if tool_name == "get_ticket_status" && result.contains("Tickets remaining: 12")
    ));
    assert_eq!(seen[3], StatusEvent::CallingModel);
    assert_eq!(seen[4], StatusEvent::Finished);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_response(ModelResponse::text("never"));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut engine = event_engine(model.clone());
    let result = engine
        .handle_command_with_cancel(&Command::new(session(), "hi"), &cancel)
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Operation cancelled"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_model_call() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_delayed(Duration::from_secs(30), ModelResponse::text("too late"));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let mut engine = event_engine(model);
    let result = engine
        .handle_command_with_cancel(&Command::new(session(), "hi"), &cancel)
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Operation cancelled"));
    assert_eq!(engine.conversation().turns_by_role(Role::Assistant).count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_tool_batch() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ModelResponse::tool_calls(vec![
            ToolCall::new("call_1", "slow", "{}"),
            ToolCall::new("call_2", "list_events", "{}"),
        ]))
        .push_response(ModelResponse::text("unreachable"));

    let mut engine = event_engine(model.clone());
    slow_tool(&mut engine);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let result = engine
        .handle_command_with_cancel(&Command::new(session(), "go"), &cancel)
        .await;

    assert!(!result.success);
    assert_eq!(model.call_count(), 1);

    // Every requested call is answered
    let results: Vec<_> = engine.conversation().turns_by_role(Role::ToolResult).collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(results[1].tool_call_id.as_deref(), Some("call_2"));
    assert!(results[1].content.contains("not executed"));
}

#[tokio::test(start_paused = true)]
async fn test_tool_deadline_is_recoverable() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ModelResponse::tool_calls(vec![ToolCall::new("call_1", "slow", "{}")]))
        .push_response(ModelResponse::text("That took too long."));

    let config = AgentConfig {
        tool_timeout_secs: Some(1),
        ..agent_config(10)
    };
    let mut engine = Engine::new(session(), model, &config);
    slow_tool(&mut engine);

    let result = engine.handle_command(&Command::new(session(), "go")).await;

    assert!(result.success);
    let tool_result = engine
        .conversation()
        .turns_by_role(Role::ToolResult)
        .next()
        .unwrap();
    assert!(tool_result.content.contains("timed out"));
}

#[tokio::test]
async fn test_registry_errors_are_typed() {
    let engine = event_engine(Arc::new(ScriptedModel::new("scripted")));
    let cancel = CancellationToken::new();

    let ok = engine
        .tools()
        .execute(
            &ToolCall::new("c1", "get_event_details", r#"{"event_name":"intro nite"}"#),
            &cancel,
        )
        .await;
    let output = assert_ok!(ok).into_text();
    assert!(output.contains("Intro Night"));

    let unknown = engine
        .tools()
        .execute(&ToolCall::new("c2", "nope", "{}"), &cancel)
        .await;
    assert!(matches!(assert_err!(unknown), ChicoError::UnknownTool(_)));
}

#[test]
fn test_command_result_round_trip() {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model.push_response(ModelResponse::text("Hello!"));
    let mut engine = event_engine(model);

    let result = tokio_test::block_on(engine.handle_command(&Command::new(session(), "hi")));
    let json = assert_ok!(serde_json::to_value(&result));
    assert_eq!(
        json,
        json!({"success": true, "result": "Hello!", "session_id": "discord_42"})
    );
}
