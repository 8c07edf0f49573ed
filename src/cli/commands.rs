//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::Engine;

/// What the REPL should do with a line of input
#[derive(Debug, PartialEq)]
pub enum ReplAction {
    /// Send as a prompt to the engine
    Prompt(String),
    /// Command was handled, show output
    Output(String),
    /// Exit the REPL
    Exit,
    /// History was cleared
    Clear,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub fn handle_input(input: &str, engine: &mut Engine, system_prompt: Option<&str>) -> ReplAction {
    let input = input.trim();
    if input.is_empty() {
        return ReplAction::None;
    }

    // Commands are bare words, optionally slash-prefixed
    let cmd = input.trim_start_matches('/').to_lowercase();

    match cmd.as_str() {
        "exit" | "quit" | "q" => ReplAction::Exit,

        "clear" | "reset" => {
            engine.clear_context();
            if let Some(prompt) = system_prompt {
                engine.set_system_prompt(prompt);
            }
            ReplAction::Clear
        }

        "help" | "?" => ReplAction::Output(help_text()),

        "status" => ReplAction::Output(status_text(engine)),

        "tools" => ReplAction::Output(tools_text(engine)),

        _ => {
            if input.starts_with('/') {
                ReplAction::Output(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                ))
            } else {
                ReplAction::Prompt(input.to_string())
            }
        }
    }
}

fn status_text(engine: &Engine) -> String {
    format!(
        "Chico Status:\n\
         ─────────────────────────────\n\
         Session:  {}\n\
         Engine:   {}\n\
         Model:    {}\n\
         Tools:    {}\n\
         History:  {} turns",
        engine.session_id(),
        engine.engine_id(),
        engine.model_name(),
        engine.tools().len(),
        engine.conversation().len(),
    )
}

fn tools_text(engine: &Engine) -> String {
    let schemas = engine.tools().list_tool_schemas();
    if schemas.is_empty() {
        return "No tools registered.".to_string();
    }

    let mut output = String::from("Available tools:\n");
    for def in schemas {
        output.push_str(&format!("  {:<22} {}\n", def.name(), def.function.description));
    }
    output.trim_end().to_string()
}

/// Generate help text
fn help_text() -> String {
    r#"Chico Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Chico
  clear, reset     Clear conversation history
  status           Show session and model info
  tools            List the tools the model can call

Keyboard Shortcuts:
  Ctrl+C           Cancel the current request
  Ctrl+D           Exit Chico

Anything else is sent to the assistant, e.g.
  how many tickets are left for Intro Night?
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AgentConfig;
    use crate::core::{SessionId, ToolDefinition};
    use crate::llm::ScriptedModel;
    use std::sync::Arc;

    fn engine() -> Engine {
        let mut engine = Engine::new(
            SessionId::new("cli_test"),
            Arc::new(ScriptedModel::new("scripted")),
            &AgentConfig::default(),
        );
        engine.tools_mut().register_fn(
            ToolDefinition::function("list_events", "List all events.", serde_json::json!({})),
            |_| Ok("".into()),
        );
        engine
    }

    #[test]
    fn test_exit_commands() {
        let mut engine = engine();
        assert_eq!(handle_input("exit", &mut engine, None), ReplAction::Exit);
        assert_eq!(handle_input("/quit", &mut engine, None), ReplAction::Exit);
    }

    #[test]
    fn test_prompt_passthrough() {
        let mut engine = engine();
        assert_eq!(
            handle_input("  what's on this week?  ", &mut engine, None),
            ReplAction::Prompt("what's on this week?".to_string())
        );
        assert_eq!(handle_input("   ", &mut engine, None), ReplAction::None);
        assert_eq!(
            handle_input("status of Intro Night?", &mut engine, None),
            ReplAction::Prompt("status of Intro Night?".to_string())
        );
    }

    #[test]
    fn test_unknown_slash_command() {
        let mut engine = engine();
        match handle_input("/frobnicate", &mut engine, None) {
            ReplAction::Output(text) => assert!(text.contains("Unknown command: frobnicate")),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_clear_restores_system_prompt() {
        let mut engine = engine();
        engine.set_system_prompt("old");
        assert_eq!(handle_input("clear", &mut engine, Some("sys")), ReplAction::Clear);
        assert_eq!(engine.conversation().system_prompt(), Some("sys"));
        assert_eq!(engine.conversation().len(), 1);
    }

    #[test]
    fn test_status_and_tools() {
        let mut engine = engine();
        match handle_input("status", &mut engine, None) {
            ReplAction::Output(text) => {
                assert!(text.contains("cli_test"));
                assert!(text.contains("scripted"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
        match handle_input("tools", &mut engine, None) {
            ReplAction::Output(text) => assert!(text.contains("list_events")),
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
