//! Interactive REPL for Chico
//!
//! Provides the main user interaction loop.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agent::{SessionStore, StatusEnvelope, StatusEvent};
use crate::cli::commands::{handle_input, ReplAction};
use crate::core::{Command, CommandResult, Config, Result, SessionId};

/// Channel name used for CLI session ids
const CLI_CHANNEL: &str = "cli";

/// Receives one line of tool activity
pub type ActivitySink = Arc<dyn Fn(String) + Send + Sync>;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    store: Arc<SessionStore>,
    user: String,
    session: SessionId,
    activity: Option<ActivitySink>,
}

impl Repl {
    /// Create a REPL for `user`, drawing engines from `store`
    pub fn new(config: Config, store: Arc<SessionStore>, user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            config,
            store,
            session: SessionId::for_user(CLI_CHANNEL, &user),
            user,
            activity: None,
        }
    }

    /// Print tool activity to stderr as it happens
    pub fn verbose(self, verbose: bool) -> Self {
        if verbose {
            self.with_activity_sink(|line| eprintln!("{}", line))
        } else {
            self
        }
    }

    /// Send tool activity lines to `sink`
    pub fn with_activity_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.activity = Some(Arc::new(sink));
        self
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let engine = self.store.get_or_create(&self.session);
            let action = {
                let mut engine = engine.lock().await;
                handle_input(&input, &mut engine, self.config.system_prompt())
            };

            match action {
                ReplAction::Exit => {
                    println!("\nGoodbye!");
                    break;
                }
                ReplAction::Clear => println!("Conversation cleared.\n"),
                ReplAction::Output(output) => println!("{}\n", output),
                ReplAction::None => continue,
                ReplAction::Prompt(prompt) => {
                    let result = self.submit(prompt).await;
                    match (result.success, result.result, result.error) {
                        (true, Some(answer), _) => println!("\nChico:\n{}\n", answer),
                        (_, _, Some(error)) => eprintln!("\nError: {}\n", error),
                        _ => eprintln!("\nError: empty result\n"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Send one prompt through the session's engine; Ctrl+C cancels it
    pub async fn submit(&self, prompt: String) -> CommandResult {
        let command =
            Command::new(self.session.clone(), prompt).with_route(&self.user, CLI_CHANNEL);
        let cancel = CancellationToken::new();

        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        // Subscribe to whichever engine serves this command; an expired
        // session gets a fresh engine with its own status channel
        let engine = self.store.get_or_create(&self.session);
        let mut engine = engine.lock().await;
        let feed = self
            .activity
            .clone()
            .map(|sink| ActivityFeed::spawn(engine.subscribe(), sink));

        let result = engine.handle_command_with_cancel(&command, &cancel).await;
        drop(engine);

        watcher.abort();
        if let Some(feed) = feed {
            feed.finish().await;
        }
        result
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!(
            r#"
╔═══════════════════════════════════════════╗
║                                           ║
║   Chico - events assistant                ║
║                                           ║
╚═══════════════════════════════════════════╝
"#
        );
        println!("Model:    {}", self.config.model.name);
        println!("Endpoint: {}", self.config.model.base_url);
        println!("Session:  {}", self.session);
        println!();
        println!("Commands: help, clear, status, tools, exit");
        println!("───────────────────────────────────────────");
    }
}

/// Forwards one command's status events to an activity sink
struct ActivityFeed {
    done: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActivityFeed {
    fn spawn(mut events: broadcast::Receiver<StatusEnvelope>, sink: ActivitySink) -> Self {
        let done = CancellationToken::new();
        let stop = done.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = events.recv() => match received {
                        Ok(envelope) => {
                            if let Some(line) = activity_line(&envelope.event) {
                                sink(line);
                            }
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            // Flush whatever was published before the command returned
            while let Ok(envelope) = events.try_recv() {
                if let Some(line) = activity_line(&envelope.event) {
                    sink(line);
                }
            }
        });

        Self { done, handle }
    }

    async fn finish(self) {
        self.done.cancel();
        let _ = self.handle.await;
    }
}

fn activity_line(event: &StatusEvent) -> Option<String> {
    match event {
        StatusEvent::ExecutingTool { tool_name } => Some(format!("  → {}", tool_name)),
        StatusEvent::ToolResult { tool_name, result } => {
            let preview: String = result.chars().take(80).collect();
            Some(format!("  ← {}: {}", tool_name, preview.replace('\n', " ")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Engine;
    use crate::core::config::{AgentConfig, SessionConfig};
    use crate::core::{ModelResponse, ToolCall, ToolDefinition};
    use crate::llm::ScriptedModel;
    use std::sync::Mutex;
    use std::time::Duration;

    fn echo_engine(id: &SessionId) -> Engine {
        let model = Arc::new(ScriptedModel::new("scripted"));
        for _ in 0..2 {
            model
                .push_response(ModelResponse::tool_calls(vec![ToolCall::new(
                    "call_1", "echo", "{}",
                )]))
                .push_response(ModelResponse::text("done"));
        }

        let mut engine = Engine::new(id.clone(), model, &AgentConfig::default());
        engine.tools_mut().register_fn(
            ToolDefinition::function("echo", "Echo", serde_json::json!({"type": "object"})),
            |_| Ok("echoed".into()),
        );
        engine
    }

    fn repl_with_log(ttl_secs: u64) -> (Repl, Arc<SessionStore>, Arc<Mutex<Vec<String>>>) {
        let store = Arc::new(SessionStore::new(
            &SessionConfig {
                capacity: 4,
                ttl_secs,
            },
            echo_engine,
        ));
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let repl = Repl::new(Config::default(), store.clone(), "local")
            .with_activity_sink(move |line| sink.lock().unwrap().push(line));
        (repl, store, log)
    }

    #[tokio::test]
    async fn test_activity_feed_reports_tools() {
        let (repl, _store, log) = repl_with_log(60);

        let result = repl.submit("go".to_string()).await;
        assert!(result.success);

        let lines = log.lock().unwrap().clone();
        assert_eq!(lines, vec!["  → echo".to_string(), "  ← echo: echoed".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_feed_survives_session_expiry() {
        let (repl, store, log) = repl_with_log(10);
        let session = SessionId::for_user(CLI_CHANNEL, "local");

        assert!(repl.submit("go".to_string()).await.success);
        let first = store.get(&session).unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.purge_expired(), 1);

        assert!(repl.submit("again".to_string()).await.success);
        let second = store.get(&session).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let lines = log.lock().unwrap().clone();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "  → echo");
    }

    #[test]
    fn test_activity_line_skips_lifecycle_events() {
        assert!(activity_line(&StatusEvent::CallingModel).is_none());
        assert!(activity_line(&StatusEvent::Finished).is_none());
        assert_eq!(
            activity_line(&StatusEvent::ToolResult {
                tool_name: "list_events".to_string(),
                result: "- Intro Night\n- Hackathon".to_string(),
            })
            .as_deref(),
            Some("  ← list_events: - Intro Night - Hackathon")
        );
    }
}
