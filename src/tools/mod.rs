//! Tools module - tool implementations for the agent
//!
//! Contains the tool registry and the event lookup tools.

pub mod events;
pub mod registry;

pub use registry::{AsyncFnTool, FnTool, Tool, ToolRegistry};
