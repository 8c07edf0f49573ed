//! Lifecycle status events
//!
//! Fire-and-forget notifications about a command's progress. Publishing never
//! fails: with no subscribers the event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::SessionId;

/// Channel capacity; slow subscribers lag rather than block the loop
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEvent {
    CallingModel,
    ExecutingTool { tool_name: String },
    ToolResult { tool_name: String, result: String },
    Finished,
    Failed { error: String },
}

/// A status event tagged with its session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub event: StatusEvent,
}

/// Broadcasts status events for one session
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    session_id: SessionId,
    tx: broadcast::Sender<StatusEnvelope>,
}

impl StatusPublisher {
    pub fn new(session_id: SessionId) -> Self {
        let (tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self { session_id, tx }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEnvelope> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: StatusEvent) {
        let envelope = StatusEnvelope {
            session_id: self.session_id.clone(),
            event,
        };
        // Err only means nobody is listening
        let _ = self.tx.send(envelope);
    }
}
