//! Chico - Tool-Calling Events Assistant
//!
//! A conversational agent that answers questions about club events by letting
//! a language model call event-lookup tools, one session per user.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Model client abstraction with an OpenAI-compatible implementation
//! - **Tools**: Tool registry, argument validation, and the event tools
//! - **Agent**: Orchestration engine, conversation history, and session store
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chico::agent::Engine;
//! use chico::core::{Command, SessionId};
//! use chico::llm::OpenAiClient;
//! use chico::Config;
//!
//! #[tokio::main]
//! async fn main() -> chico::Result<()> {
//!     let config = Config::load();
//!     let model = Arc::new(OpenAiClient::from_config(&config)?);
//!     let session = SessionId::for_user("cli", "alice");
//!
//!     let mut engine = Engine::new(session.clone(), model, &config.agent)
//!         .with_system_prompt("You are a helpful assistant.");
//!     let result = engine.handle_command(&Command::new(session, "Hello!")).await;
//!     println!("{:?}", result.result);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Engine, SessionStore};
pub use cli::Repl;
pub use core::{ChicoError, Config, Result};
