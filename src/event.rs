//! Canonical event envelope and per-kind payload contracts.
//!
//! Every event shares one outer shape (the envelope) regardless of kind:
//! schema version, UTC timestamp, sortable id, machine identity, execution
//! context, kind + tags, emitting source, a kind-specific payload, and
//! causal links to other events. Payloads are a tagged union keyed by kind,
//! so the required-field table for each kind is enforced by the type system
//! rather than caller discipline; only the reserved `log` kind and
//! namespaced custom kinds carry an open map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Format tag written into every envelope for forward compatibility.
pub const SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// EVENT ID
// ============================================================================

/// Unique, time-sortable identifier for an event.
///
/// Returned by every write so callers can thread it into
/// [`Parent::event_id`] of causally related follow-up events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub(crate) String);

impl EventId {
    /// View the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// EVENT KIND
// ============================================================================

/// The event's category, determining which fields its payload requires.
///
/// Reserved kinds are either bare (`error`, `metric`, ...) or namespaced
/// under `constellation:`. Anything else must be a namespaced custom kind
/// (`my-plugin:cache_miss`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `constellation:tool_execute` — a tool invocation (before or after)
    ToolExecute,
    /// `constellation:hook_fired` — a hook ran for a plugin
    HookFired,
    /// `constellation:agent_spawned` — a sub-agent session was created
    AgentSpawned,
    /// `constellation:skill_loaded` — a skill definition was loaded
    SkillLoaded,
    /// `constellation:command_executed` — a slash command ran
    CommandExecuted,
    /// `constellation:plugin_event` — a plugin lifecycle event
    PluginEvent,
    /// `error` — a failure anywhere in the shell
    Error,
    /// `metric` — a named measurement
    Metric,
    /// `log` — free-form structured log line
    Log,
    /// `span` — a unit of work with start/end and lifecycle status
    Span,
    /// `session_start` — a session began
    SessionStart,
    /// `session_end` — a session finished
    SessionEnd,
    /// `session_summary` — a summary written for a finished session
    SessionSummary,
    /// A namespaced custom kind, e.g. `my-plugin:cache_miss`
    Custom(String),
}

impl EventKind {
    /// The wire/storage representation of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ToolExecute => "constellation:tool_execute",
            EventKind::HookFired => "constellation:hook_fired",
            EventKind::AgentSpawned => "constellation:agent_spawned",
            EventKind::SkillLoaded => "constellation:skill_loaded",
            EventKind::CommandExecuted => "constellation:command_executed",
            EventKind::PluginEvent => "constellation:plugin_event",
            EventKind::Error => "error",
            EventKind::Metric => "metric",
            EventKind::Log => "log",
            EventKind::Span => "span",
            EventKind::SessionStart => "session_start",
            EventKind::SessionEnd => "session_end",
            EventKind::SessionSummary => "session_summary",
            EventKind::Custom(s) => s,
        }
    }

    /// Parse a stored kind string.
    ///
    /// Reserved names map to their variants; any other name must carry a
    /// namespace separator to be accepted as custom.
    pub fn parse(s: &str) -> Result<Self> {
        let kind = match s {
            "constellation:tool_execute" => EventKind::ToolExecute,
            "constellation:hook_fired" => EventKind::HookFired,
            "constellation:agent_spawned" => EventKind::AgentSpawned,
            "constellation:skill_loaded" => EventKind::SkillLoaded,
            "constellation:command_executed" => EventKind::CommandExecuted,
            "constellation:plugin_event" => EventKind::PluginEvent,
            "error" => EventKind::Error,
            "metric" => EventKind::Metric,
            "log" => EventKind::Log,
            "span" => EventKind::Span,
            "session_start" => EventKind::SessionStart,
            "session_end" => EventKind::SessionEnd,
            "session_summary" => EventKind::SessionSummary,
            custom if custom.contains(':') => EventKind::Custom(custom.to_string()),
            other => {
                return Err(Error::ConstraintViolation(format!(
                    "unknown event kind '{other}': custom kinds must be namespaced (ns:name)"
                )))
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EventKind::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SMALL ENUMS
// ============================================================================

/// Which side of a tool invocation a `tool_execute` event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPhase {
    /// Emitted before the tool runs; carries the arguments.
    Before,
    /// Emitted after the tool returns; carries result and duration.
    After,
}

impl ToolPhase {
    /// The wire representation (`"before"` / `"after"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolPhase::Before => "before",
            ToolPhase::After => "after",
        }
    }
}

impl fmt::Display for ToolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The span has started and not yet finished.
    Started,
    /// The span finished successfully.
    Completed,
    /// The span finished with a failure.
    Failed,
}

impl SpanStatus {
    /// The wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Started => "started",
            SpanStatus::Completed => "completed",
            SpanStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a spawned agent runs as a sub-agent or takes over as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Spawned under a parent session.
    Subagent,
    /// Promoted to the primary session agent.
    Primary,
}

// ============================================================================
// ENVELOPE SECTIONS
// ============================================================================

/// Identity of the host environment the event was recorded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Stable machine identity for the data directory.
    pub id: String,
    /// Hostname, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Logical execution context the event occurred in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Session the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Acting agent or user, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Free-form phase label (e.g. a tool's `before`/`after`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// The event's category plus free-form classification labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Category of the event.
    pub kind: EventKind,
    /// Free-form classification labels. Tags may not contain commas; they
    /// are persisted comma-flattened and split back on read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Which internal subsystem emitted the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Subsystem name, e.g. `tool-executor`.
    pub component: String,
    /// Subsystem version, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Causal links to other events.
///
/// `event_id` points at the direct cause; `trace_id` groups all events of
/// one multi-step workflow; `span_id` attaches the event to a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    /// Direct causal predecessor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    /// Workflow-level grouping id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Enclosing span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

// ============================================================================
// PER-KIND PAYLOADS
// ============================================================================

/// Payload for `constellation:tool_execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecute {
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Arguments the tool was called with.
    pub args: Value,
    /// Session the invocation belongs to.
    pub context_session_id: String,
    /// `before` or `after`.
    pub phase: ToolPhase,
    /// Agent that invoked the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_agent: Option<String>,
    /// Tool result (after phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Wall-clock duration (after phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Error message if the tool failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload for `constellation:hook_fired`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookFired {
    /// Name of the hook that fired.
    pub hook_name: String,
    /// Plugin the hook belongs to.
    pub plugin_name: String,
    /// Session the hook fired in.
    pub context_session_id: String,
    /// Payload delivered to the hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_payload: Option<Value>,
    /// Hook execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Payload for `constellation:agent_spawned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpawned {
    /// Persona name of the spawned agent.
    pub agent_name: String,
    /// Session that requested the spawn.
    pub parent_session_id: String,
    /// Session created for the spawned agent.
    pub child_session_id: String,
    /// Sub-agent or primary.
    pub agent_mode: AgentMode,
    /// Model the agent runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tools enabled for the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_enabled: Option<Vec<String>>,
}

/// Payload for `constellation:skill_loaded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillLoaded {
    /// Name of the loaded skill.
    pub skill_name: String,
    /// Filesystem path the skill was loaded from.
    pub skill_path: String,
    /// Session the skill was loaded into.
    pub context_session_id: String,
    /// Agent that triggered the load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_agent: Option<String>,
}

/// Payload for `constellation:command_executed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandExecuted {
    /// Name of the executed command.
    pub command_name: String,
    /// Session the command ran in.
    pub context_session_id: String,
    /// Command arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Command execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Command result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Payload for `constellation:plugin_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEvent {
    /// Plugin that emitted the event.
    pub plugin_name: String,
    /// Plugin-defined event type.
    pub event_type: String,
    /// Session, when the event is session-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_session_id: Option<String>,
    /// Plugin-defined details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

/// Payload for `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Classification of the failure.
    pub error_type: String,
    /// Human-readable description.
    pub message: String,
    /// Session the failure occurred in.
    pub context_session_id: String,
    /// Whether retrying the operation could succeed.
    pub retryable: bool,
    /// Whether the failure is expected to clear on its own.
    pub transient: bool,
    /// Machine-readable code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Tool involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Invariants the failure violated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariants_violated: Option<Vec<String>>,
    /// Raw output captured at the failure site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Suggested or attempted recovery actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_actions: Option<Vec<String>>,
}

/// Payload for `metric`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    /// Metric name.
    pub metric_name: String,
    /// Measured value.
    pub value: f64,
    /// Unit of measure (`ms`, `count`, `bytes`, ...).
    pub unit: String,
    /// Session, when the metric is session-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_session_id: Option<String>,
    /// Extra aggregation dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Map<String, Value>>,
}

/// Payload for `span`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    /// Span identifier, unique within its trace.
    pub span_id: String,
    /// Name of the unit of work.
    pub name: String,
    /// Lifecycle status.
    pub status: SpanStatus,
    /// When the span started.
    pub start_ts: DateTime<Utc>,
    /// Enclosing span, for nesting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Trace the span belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// When the span finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ts: Option<DateTime<Utc>>,
    /// Elapsed time between start and end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Session the span ran in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_session_id: Option<String>,
}

/// Payload shared by `session_start`, `session_end`, and `session_summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// The session this lifecycle event describes.
    pub session_id: String,
    /// Agent persona running the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Model backing the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Working directory of the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Parent session, for spawned agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    /// Session duration (end/summary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Number of messages exchanged (end/summary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    /// Summary text (summary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ============================================================================
// PAYLOAD UNION
// ============================================================================

/// Kind-specific payload, one variant per reserved kind.
///
/// Serialized as the bare payload object (no enum tag) — the kind column of
/// the envelope selects the variant on the way back in via
/// [`EventData::from_kind_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// `constellation:tool_execute`
    ToolExecute(ToolExecute),
    /// `constellation:hook_fired`
    HookFired(HookFired),
    /// `constellation:agent_spawned`
    AgentSpawned(AgentSpawned),
    /// `constellation:skill_loaded`
    SkillLoaded(SkillLoaded),
    /// `constellation:command_executed`
    CommandExecuted(CommandExecuted),
    /// `constellation:plugin_event`
    PluginEvent(PluginEvent),
    /// `error`
    Error(ErrorData),
    /// `metric`
    Metric(MetricData),
    /// `span`
    Span(SpanData),
    /// `session_start`
    SessionStart(SessionEvent),
    /// `session_end`
    SessionEnd(SessionEvent),
    /// `session_summary`
    SessionSummary(SessionEvent),
    /// `log` — free-form structured fields
    Log(Map<String, Value>),
    /// Namespaced custom kinds — open payload map
    Custom(Map<String, Value>),
}

impl EventData {
    /// The kind this payload belongs to, when the variant determines it.
    ///
    /// `Custom` payloads return `None`; their kind is supplied separately
    /// through the generic write path.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            EventData::ToolExecute(_) => Some(EventKind::ToolExecute),
            EventData::HookFired(_) => Some(EventKind::HookFired),
            EventData::AgentSpawned(_) => Some(EventKind::AgentSpawned),
            EventData::SkillLoaded(_) => Some(EventKind::SkillLoaded),
            EventData::CommandExecuted(_) => Some(EventKind::CommandExecuted),
            EventData::PluginEvent(_) => Some(EventKind::PluginEvent),
            EventData::Error(_) => Some(EventKind::Error),
            EventData::Metric(_) => Some(EventKind::Metric),
            EventData::Span(_) => Some(EventKind::Span),
            EventData::SessionStart(_) => Some(EventKind::SessionStart),
            EventData::SessionEnd(_) => Some(EventKind::SessionEnd),
            EventData::SessionSummary(_) => Some(EventKind::SessionSummary),
            EventData::Log(_) => Some(EventKind::Log),
            EventData::Custom(_) => None,
        }
    }

    /// Session id carried inside the payload, for threading into the
    /// envelope context when the caller did not set one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            EventData::ToolExecute(d) => Some(&d.context_session_id),
            EventData::HookFired(d) => Some(&d.context_session_id),
            EventData::AgentSpawned(d) => Some(&d.child_session_id),
            EventData::SkillLoaded(d) => Some(&d.context_session_id),
            EventData::CommandExecuted(d) => Some(&d.context_session_id),
            EventData::PluginEvent(d) => d.context_session_id.as_deref(),
            EventData::Error(d) => Some(&d.context_session_id),
            EventData::Metric(d) => d.context_session_id.as_deref(),
            EventData::Span(d) => d.context_session_id.as_deref(),
            EventData::SessionStart(d)
            | EventData::SessionEnd(d)
            | EventData::SessionSummary(d) => Some(&d.session_id),
            EventData::Log(m) | EventData::Custom(m) => {
                m.get("context_session_id").and_then(Value::as_str)
            }
        }
    }

    /// Serialize the payload to its persisted JSON form.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild the typed payload from a kind and its persisted JSON.
    ///
    /// This is the exhaustive match the query engine uses: a reserved kind
    /// whose stored payload no longer satisfies its contract is surfaced as
    /// a deserialization error, not silently degraded to a map.
    pub fn from_kind_value(kind: &EventKind, value: Value) -> Result<Self> {
        let data = match kind {
            EventKind::ToolExecute => EventData::ToolExecute(serde_json::from_value(value)?),
            EventKind::HookFired => EventData::HookFired(serde_json::from_value(value)?),
            EventKind::AgentSpawned => EventData::AgentSpawned(serde_json::from_value(value)?),
            EventKind::SkillLoaded => EventData::SkillLoaded(serde_json::from_value(value)?),
            EventKind::CommandExecuted => {
                EventData::CommandExecuted(serde_json::from_value(value)?)
            }
            EventKind::PluginEvent => EventData::PluginEvent(serde_json::from_value(value)?),
            EventKind::Error => EventData::Error(serde_json::from_value(value)?),
            EventKind::Metric => EventData::Metric(serde_json::from_value(value)?),
            EventKind::Span => EventData::Span(serde_json::from_value(value)?),
            EventKind::SessionStart => EventData::SessionStart(serde_json::from_value(value)?),
            EventKind::SessionEnd => EventData::SessionEnd(serde_json::from_value(value)?),
            EventKind::SessionSummary => {
                EventData::SessionSummary(serde_json::from_value(value)?)
            }
            EventKind::Log => EventData::Log(serde_json::from_value(value)?),
            EventKind::Custom(_) => EventData::Custom(serde_json::from_value(value)?),
        };
        Ok(data)
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// A complete telemetry event. Immutable once written; corrections are new
/// events referencing the original via [`Parent::event_id`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Format tag, currently [`SCHEMA_VERSION`].
    pub schema_version: String,
    /// UTC timestamp, millisecond precision.
    pub ts: DateTime<Utc>,
    /// Unique, sortable identifier (primary key).
    pub event_id: EventId,
    /// Host environment identity.
    pub machine: Machine,
    /// Logical execution context.
    pub context: Context,
    /// Kind and tags.
    pub event: EventInfo,
    /// Emitting subsystem.
    pub source: Source,
    /// Kind-specific payload.
    pub data: EventData,
    /// Causal links.
    pub parent: Parent,
}

impl Event {
    /// Shorthand for the event's kind.
    pub fn kind(&self) -> &EventKind {
        &self.event.kind
    }
}
