//! Configuration management for Chico
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/chico/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{ChicoError, Result};

/// System prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for WIT Unimelb \
(Women in Technology at the University of Melbourne). You help users find information \
about events, check ticket availability, and provide details about upcoming activities.

You have access to the following tools:
- list_events: Lists all available events
- get_event_details: Gets detailed information about a specific event
- get_ticket_status: Checks ticket availability for an event
- search_events: Searches for events matching a query
- get_upcoming_events: Shows upcoming events

When users ask about events, tickets, or activities, use the appropriate tools to provide \
accurate information. Be friendly and helpful.

If a user asks about something not related to events or WIT Unimelb, politely redirect them \
to ask about events or activities.";

/// Main configuration for Chico
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language-model service configuration
    pub model: ModelConfig,
    /// Events provider configuration
    pub events: EventsConfig,
    /// Orchestration loop configuration
    pub agent: AgentConfig,
    /// Session store configuration
    pub sessions: SessionConfig,
}

/// Chat-completions endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible API (default: https://api.openai.com/v1)
    pub base_url: String,
    /// Model name (default: gpt-4.1-mini)
    pub name: String,
    /// API key sent as a bearer token; read but never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Humanitix API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub base_url: String,
    /// Sent as `x-api-key`; read but never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Orchestration loop behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// System prompt installed on every new session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum model calls per command
    /// Default: 10
    pub max_iterations: usize,
    /// Deadline for a single model call, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_timeout_secs: Option<u64>,
    /// Deadline for a single tool execution, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    /// Longest tool error message placed back into the conversation
    pub max_tool_error_len: usize,
}

/// Host-side session store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of live sessions before LRU eviction
    pub capacity: usize,
    /// Idle time after which a session expires, in seconds
    pub ttl_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            name: env::var("CHICO_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            api_key: env::var("OPENAI_API_KEY").ok(),
            timeout_secs: 60,
            temperature: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("HUMANITIX_BASE_URL")
                .unwrap_or_else(|_| "https://api.humanitix.com".to_string()),
            api_key: env::var("HUMANITIX_API_KEY").ok(),
            timeout_secs: 30,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_iterations: env::var("CHICO_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            model_timeout_secs: None,
            tool_timeout_secs: None,
            max_tool_error_len: 500,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 60 * 60,
        }
    }
}

impl AgentConfig {
    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_secs.map(Duration::from_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chico")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Pick up a .env file if one exists
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ChicoError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ChicoError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; missing keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ChicoError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| ChicoError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ChicoError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| ChicoError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }

    /// System prompt for new sessions, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.agent.system_prompt.as_deref()
    }
}
