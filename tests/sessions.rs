//! Session isolation and the host-side session store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chico::agent::session::event_assistant_factory;
use chico::agent::{Engine, SessionStore};
use chico::core::config::{AgentConfig, SessionConfig};
use chico::core::{Command, ModelResponse, Role, SessionId, ToolCall, ToolDefinition};
use chico::llm::ScriptedModel;
use chico::tools::events::{EventsService, EVENT_TOOL_NAMES};
use chico::Config;
use futures::future::join_all;
use serde_json::json;

/// Engine whose `bump` tool counts its own invocations
fn counting_engine(id: &SessionId) -> Engine {
    let model = Arc::new(ScriptedModel::new("scripted"));
    model
        .push_response(ModelResponse::tool_calls(vec![ToolCall::new("call_1", "bump", "{}")]))
        .push_response(ModelResponse::text("bumped"));

    let config = AgentConfig {
        system_prompt: None,
        max_iterations: 5,
        model_timeout_secs: None,
        tool_timeout_secs: None,
        max_tool_error_len: 500,
    };
    let mut engine = Engine::new(id.clone(), model, &config);

    let counter = Arc::new(AtomicUsize::new(0));
    engine.tools_mut().register_fn(
        ToolDefinition::function("bump", "Increment a counter", json!({"type": "object"})),
        move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("count={}", n).into())
        },
    );
    engine
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let store = Arc::new(SessionStore::new(&SessionConfig::default(), counting_engine));
    let ids = [
        SessionId::for_user("discord", "alice"),
        SessionId::for_user("discord", "bob"),
    ];

    let runs = ids.iter().map(|id| {
        let store = store.clone();
        let id = id.clone();
        async move {
            let engine = store.get_or_create(&id);
            let mut engine = engine.lock().await;
            engine.handle_command(&Command::new(id, "bump it")).await
        }
    });
    let results = join_all(runs).await;

    assert!(results.iter().all(|r| r.success));
    assert_eq!(store.len(), 2);

    for id in &ids {
        let engine = store.get(id).unwrap();
        let engine = engine.lock().await;
        let turns = engine.conversation().retrieve();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, "bump it");

        let tool_result = &turns[2];
        assert_eq!(tool_result.role, Role::ToolResult);
        assert_eq!(tool_result.content, "count=1");
    }
}

#[tokio::test]
async fn test_same_session_reuses_engine_state() {
    let store = SessionStore::new(&SessionConfig::default(), counting_engine);
    let id = SessionId::for_user("cli", "carol");

    let first = store.get_or_create(&id);
    first
        .lock()
        .await
        .handle_command(&Command::new(id.clone(), "bump it"))
        .await;

    let again = store.get_or_create(&id);
    let engine = again.lock().await;
    assert_eq!(engine.conversation().turns_by_role(Role::User).count(), 1);
    assert_eq!(engine.session_id(), &id);
}

#[tokio::test]
async fn test_event_assistant_factory() {
    let mut config = Config::default();
    config.agent.system_prompt = Some("Only talk about events.".to_string());

    let model = Arc::new(ScriptedModel::new("scripted"));
    let provider = Arc::new(EmptyProvider);
    let events = Arc::new(EventsService::new(provider));

    let store = SessionStore::new(
        &config.sessions,
        event_assistant_factory(&config, model, events),
    );
    let engine = store.get_or_create(&SessionId::for_user("discord", "7"));
    let engine = engine.lock().await;

    assert_eq!(
        engine.conversation().system_prompt(),
        Some("Only talk about events.")
    );
    let mut expected = EVENT_TOOL_NAMES.to_vec();
    expected.sort_unstable();
    assert_eq!(engine.tools().names(), expected);
}

struct EmptyProvider;

#[async_trait::async_trait]
impl chico::tools::events::EventsProvider for EmptyProvider {
    async fn list_events(&self) -> chico::Result<Vec<chico::tools::events::Event>> {
        Ok(Vec::new())
    }

    async fn order_count(&self, _event_id: &str) -> chico::Result<Option<usize>> {
        Ok(None)
    }
}
