//! Agent loop state management
//!
//! Tracks where a single command is in the model/tool cycle.

use std::fmt;

/// Phase of the orchestration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed,
}

impl LoopPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopPhase::Done | LoopPhase::Failed)
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::AwaitingModel => write!(f, "awaiting_model"),
            LoopPhase::ExecutingTools => write!(f, "executing_tools"),
            LoopPhase::Done => write!(f, "done"),
            LoopPhase::Failed => write!(f, "failed"),
        }
    }
}

/// State of one command's model/tool loop
#[derive(Debug, Clone)]
pub struct LoopState {
    pub phase: LoopPhase,
    /// Model calls made so far
    pub iteration: usize,
    /// Maximum model calls allowed
    pub max_iterations: usize,
    /// Tool calls dispatched so far, failed ones included
    pub tool_calls_executed: usize,
}

impl LoopState {
    /// Create a new loop state, starting in `AwaitingModel`
    pub fn new(max_iterations: usize) -> Self {
        Self {
            phase: LoopPhase::AwaitingModel,
            iteration: 0,
            max_iterations,
            tool_calls_executed: 0,
        }
    }

    /// Whether another model call is allowed
    pub fn can_call_model(&self) -> bool {
        self.iteration < self.max_iterations
    }

    /// Record a model call
    pub fn begin_model_call(&mut self) {
        self.phase = LoopPhase::AwaitingModel;
        self.iteration += 1;
    }

    pub fn begin_tools(&mut self) {
        self.phase = LoopPhase::ExecutingTools;
    }

    pub fn record_tool_call(&mut self) {
        self.tool_calls_executed += 1;
    }

    pub fn finish(&mut self) {
        self.phase = LoopPhase::Done;
    }

    pub fn fail(&mut self) {
        self.phase = LoopPhase::Failed;
    }
}
