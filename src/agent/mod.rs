//! Agent module - orchestration and conversation management
//!
//! Contains the engine that coordinates model calls and tool execution, the
//! per-session conversation it keeps, and the host-side session store.

pub mod conversation;
pub mod loop_state;
pub mod orchestrator;
pub mod session;
pub mod status;

pub use conversation::Conversation;
pub use loop_state::{LoopPhase, LoopState};
pub use orchestrator::Engine;
pub use session::{SessionStore, SharedEngine};
pub use status::{StatusEnvelope, StatusEvent, StatusPublisher};
