//! Chico - tool-calling events assistant
//!
//! Main entry point for the CLI application.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use chico::agent::session::event_assistant_factory;
use chico::llm::{ModelClient, OpenAiClient};
use chico::tools::events::{EventsService, HumanitixClient};
use chico::{Config, Repl, SessionStore};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions are swept in interactive mode
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Chico - tool-calling events assistant
#[derive(Parser, Debug)]
#[command(name = "chico")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// User id; each user gets a separate conversation
    #[arg(long, short = 'u', default_value = "local")]
    user: String,

    /// Model name override
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Maximum model calls per request
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "chico=debug" } else { "chico=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.model.name = model.clone();
    }

    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    if config.model.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; model requests will likely be rejected");
    }

    let model: Arc<dyn ModelClient> =
        Arc::new(OpenAiClient::from_config(&config).context("building model client")?);
    let provider =
        HumanitixClient::from_config(&config).context("building events client")?;
    if !provider.has_api_key() {
        warn!("HUMANITIX_API_KEY is not set; event tools will report errors");
    }
    let events = Arc::new(EventsService::new(Arc::new(provider)));

    let store = Arc::new(SessionStore::new(
        &config.sessions,
        event_assistant_factory(&config, model, events),
    ));

    let mut repl = Repl::new(config, store.clone(), args.user).verbose(args.debug);

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let result = repl.submit(prompt).await;
        match (result.result, result.error) {
            (Some(answer), _) if result.success => {
                println!("{}", answer);
                return Ok(());
            }
            (_, error) => {
                anyhow::bail!(error.unwrap_or_else(|| "command failed".to_string()))
            }
        }
    }

    // Sweep idle sessions while the REPL runs
    let sweeper = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            loop {
                interval.tick().await;
                store.purge_expired();
            }
        })
    };

    repl.run().await?;
    sweeper.abort();

    Ok(())
}
