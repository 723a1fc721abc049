//! # constellation-telemetry
//!
//! Embedded event telemetry store for the constellation orchestration
//! shell. Records what the shell's components did — tool invocations, hook
//! firings, sub-agent spawns, skill loads, command executions, plugin
//! events, errors, metrics, spans, and session lifecycle — into a single
//! SQLite database under a data directory, and answers filtered queries
//! over it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use constellation_telemetry::prelude::*;
//!
//! // One handle per process, passed by reference to every caller.
//! let tel = Telemetry::open("./.constellation")?;
//!
//! // Typed writers return the new event id for causal threading.
//! let start = tel.session_start(
//!     SessionEvent { session_id: "S1".into(), agent: Some("planner".into()),
//!                    model: None, directory: None, parent_session_id: None,
//!                    duration_ms: None, message_count: None, summary: None },
//!     WriteOptions::default(),
//! )?;
//!
//! tel.metric(
//!     MetricData { metric_name: "startup_ms".into(), value: 41.0,
//!                  unit: "ms".into(), context_session_id: Some("S1".into()),
//!                  dimensions: None },
//!     WriteOptions::new().caused_by(start),
//! )?;
//!
//! // Filtered reads, newest first.
//! let recent = tel.query_events(&EventFilter::new().session("S1").limit(100))?;
//!
//! tel.close()?;
//! ```
//!
//! ## Model
//!
//! Every event shares one envelope (schema version, UTC timestamp, sortable
//! id, machine identity, context, kind + tags, source, payload, causal
//! links). Payloads are typed per kind — see [`EventData`]. Events are
//! append-only: never updated or deleted; corrections are new events
//! referencing the original via `parent.event_id`.
//!
//! The store is synchronous and single-process: writes commit before the
//! call returns, and concurrent in-process writers serialize inside the
//! store. Multiple processes sharing a data directory rely on SQLite's own
//! file locking.

#![warn(missing_docs)]

mod error;
mod event;
mod id;
mod identity;
mod query;
mod store;
mod telemetry;
mod writers;

pub mod prelude;

// Entry points
pub use telemetry::{Telemetry, TelemetryBuilder};

// Error handling
pub use error::{Error, Result};

// Envelope and payloads
pub use event::{
    AgentMode, AgentSpawned, CommandExecuted, Context, ErrorData, Event, EventData, EventId,
    EventInfo, EventKind, HookFired, Machine, MetricData, Parent, PluginEvent, SessionEvent,
    SkillLoaded, Source, SpanData, SpanStatus, ToolExecute, ToolPhase, SCHEMA_VERSION,
};

// Writing and querying
pub use query::EventFilter;
pub use writers::WriteOptions;

// Identity
pub use identity::{MACHINE_ID_ENV, MACHINE_ID_FILE};

// Storage layout
pub use store::DB_FILE;
