//! Event tools module
//!
//! Lookups against the events/ticketing provider, exposed to the model as tools.

pub mod client;
pub mod service;
mod tools;

pub use client::{Event, EventsProvider, HumanitixClient};
pub use service::EventsService;
pub use tools::{register_event_tools, EVENT_TOOL_NAMES};
