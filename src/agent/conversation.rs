//! Conversation history management
//!
//! Ordered record of one session's dialogue. The system prompt is kept apart
//! from the other turns so it always comes first and never duplicates.

use crate::core::{ModelResponse, Role, Turn};

/// Manages conversation history for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// Turns in insertion order, excluding the system prompt
    turns: Vec<Turn>,
    /// System prompt (always first)
    system_prompt: Option<String>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the system prompt without touching other turns
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    /// Current system prompt, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Append a user turn
    pub fn store_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    /// Append the raw model output, tool calls included
    pub fn store_assistant(&mut self, response: &ModelResponse) {
        self.turns.push(Turn::assistant(response));
    }

    /// Append the outcome of a tool call (success text or error text)
    pub fn store_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.turns
            .push(Turn::tool_result(tool_call_id, name, content));
    }

    /// Full ordered turn sequence, system turn first
    pub fn retrieve(&self) -> Vec<Turn> {
        let mut result = Vec::with_capacity(self.len());

        if let Some(ref prompt) = self.system_prompt {
            result.push(Turn::system(prompt.clone()));
        }

        result.extend(self.turns.iter().cloned());
        result
    }

    /// Drop every turn, system prompt included
    pub fn clear(&mut self) {
        self.turns.clear();
        self.system_prompt = None;
    }

    /// Number of turns `retrieve` would return
    pub fn len(&self) -> usize {
        self.turns.len() + usize::from(self.system_prompt.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the last assistant turn
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }

    /// Non-system turns with the given role
    pub fn turns_by_role(&self, role: Role) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(move |t| t.role == role)
    }
}
