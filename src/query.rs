//! Filtered queries over the event store.
//!
//! Filters are independently optional and conjunctive: every filter that is
//! set must match (AND). An empty filter returns all events, subject to
//! limit/offset. Results are always ordered most recent first.

use chrono::{DateTime, Utc};

use crate::event::EventKind;

/// Filter set for [`Telemetry::query_events`](crate::Telemetry::query_events).
///
/// # Example
///
/// ```ignore
/// let errors = tel.query_events(
///     &EventFilter::new()
///         .kind(EventKind::Error)
///         .session("S1")
///         .limit(50),
/// )?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match a single event kind.
    pub kind: Option<EventKind>,
    /// Match events in one session.
    pub session_id: Option<String>,
    /// Match events recorded by one machine.
    pub machine_id: Option<String>,
    /// Earliest timestamp, inclusive.
    pub since: Option<DateTime<Utc>>,
    /// Latest timestamp, inclusive.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of events to return, applied after ordering.
    pub limit: Option<u32>,
    /// Number of ranked events to skip, applied after ordering.
    pub offset: Option<u32>,
}

impl EventFilter {
    /// An empty filter: all events, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one kind.
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to one session.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Restrict to one machine.
    pub fn machine(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }

    /// Drop events older than `ts` (inclusive bound).
    pub fn since(mut self, ts: DateTime<Utc>) -> Self {
        self.since = Some(ts);
        self
    }

    /// Drop events newer than `ts` (inclusive bound).
    pub fn until(mut self, ts: DateTime<Utc>) -> Self {
        self.until = Some(ts);
        self
    }

    /// Cap the number of returned events.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` ranked events.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
