//! Convenient imports for the telemetry store.
//!
//! ```ignore
//! use constellation_telemetry::prelude::*;
//!
//! let tel = Telemetry::open("./.constellation")?;
//! ```

// Entry point
pub use crate::telemetry::{Telemetry, TelemetryBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Envelope and payloads
pub use crate::event::{
    AgentMode, AgentSpawned, CommandExecuted, ErrorData, Event, EventData, EventId, EventKind,
    HookFired, MetricData, Parent, PluginEvent, SessionEvent, SkillLoaded, SpanData, SpanStatus,
    ToolExecute, ToolPhase,
};

// Writing and querying
pub use crate::query::EventFilter;
pub use crate::writers::WriteOptions;

// Re-export serde_json for payload construction
pub use serde_json::json;
