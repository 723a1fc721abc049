//! Event writers.
//!
//! [`Telemetry::write_event`] is the low-level path: it assembles the full
//! envelope (schema version, UTC timestamp, fresh sortable id, resolved
//! machine identity, supplied context/source/parent), appends it, and
//! returns the new id so the caller can thread it as `parent.event_id` of
//! causally related follow-up events.
//!
//! Above it sit twelve typed writers, one per reserved kind, each taking
//! that kind's payload struct and defaulting `source.component` to the
//! subsystem that owns the kind.

use chrono::{Timelike, Utc};

use crate::error::{Error, Result};
use crate::event::{
    AgentSpawned, CommandExecuted, Context, ErrorData, Event, EventData, EventId, EventInfo,
    EventKind, HookFired, MetricData, Parent, PluginEvent, SessionEvent, SkillLoaded, Source,
    SpanData, ToolExecute, SCHEMA_VERSION,
};
use crate::telemetry::Telemetry;

// Default source.component per kind.
const COMPONENT_TOOL: &str = "tool-executor";
const COMPONENT_HOOK: &str = "hook-dispatcher";
const COMPONENT_AGENT: &str = "agent-manager";
const COMPONENT_SKILL: &str = "skill-loader";
const COMPONENT_COMMAND: &str = "command-runner";
const COMPONENT_PLUGIN: &str = "plugin-host";
const COMPONENT_ERROR: &str = "error-reporter";
const COMPONENT_METRIC: &str = "metrics";
const COMPONENT_SPAN: &str = "tracer";
const COMPONENT_SESSION: &str = "session-manager";
const COMPONENT_LOG: &str = "logger";
const COMPONENT_CUSTOM: &str = "custom";

fn default_component(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::ToolExecute => COMPONENT_TOOL,
        EventKind::HookFired => COMPONENT_HOOK,
        EventKind::AgentSpawned => COMPONENT_AGENT,
        EventKind::SkillLoaded => COMPONENT_SKILL,
        EventKind::CommandExecuted => COMPONENT_COMMAND,
        EventKind::PluginEvent => COMPONENT_PLUGIN,
        EventKind::Error => COMPONENT_ERROR,
        EventKind::Metric => COMPONENT_METRIC,
        EventKind::Span => COMPONENT_SPAN,
        EventKind::SessionStart | EventKind::SessionEnd | EventKind::SessionSummary => {
            COMPONENT_SESSION
        }
        EventKind::Log => COMPONENT_LOG,
        EventKind::Custom(_) => COMPONENT_CUSTOM,
    }
}

/// Envelope fields supplied by the caller of a write.
///
/// Everything here is optional; typed writers fill sensible defaults
/// (session threaded from the payload, the kind's owning component).
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Session for `context.session_id`. When unset, typed writers thread
    /// the session carried inside the payload.
    pub session_id: Option<String>,
    /// Acting agent or user for `context.actor`.
    pub actor: Option<String>,
    /// Phase label for `context.phase`. Tool writers default this to the
    /// payload's `before`/`after`.
    pub phase: Option<String>,
    /// Free-form classification tags (no commas).
    pub tags: Vec<String>,
    /// Override the kind's default `source.component`.
    pub source_component: Option<String>,
    /// Version of the emitting subsystem.
    pub source_version: Option<String>,
    /// Causal links to earlier events.
    pub parent: Parent,
}

impl WriteOptions {
    /// Options with every field defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `context.session_id`.
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set `context.actor`.
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Add a classification tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Link to the event that caused this one.
    pub fn caused_by(mut self, event_id: EventId) -> Self {
        self.parent.event_id = Some(event_id);
        self
    }

    /// Attach to a workflow trace.
    pub fn trace(mut self, trace_id: impl Into<String>) -> Self {
        self.parent.trace_id = Some(trace_id.into());
        self
    }

    /// Attach to an enclosing span.
    pub fn span(mut self, span_id: impl Into<String>) -> Self {
        self.parent.span_id = Some(span_id.into());
        self
    }

    /// Set `source.version`.
    pub fn source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }
}

impl Telemetry {
    /// Write an event of any kind.
    ///
    /// The kind must agree with the payload variant; a namespaced custom
    /// kind carries an open-map payload. Returns the generated event id.
    pub fn write_event(
        &self,
        kind: EventKind,
        data: EventData,
        opts: WriteOptions,
    ) -> Result<EventId> {
        if let Some(data_kind) = data.kind() {
            if data_kind != kind {
                return Err(Error::ConstraintViolation(format!(
                    "payload is for kind '{data_kind}', not '{kind}'"
                )));
            }
        } else if !matches!(kind, EventKind::Custom(_)) {
            return Err(Error::ConstraintViolation(format!(
                "open-map payloads require a namespaced custom kind, got '{kind}'"
            )));
        }
        self.write(kind, data, opts)
    }

    fn write(&self, kind: EventKind, data: EventData, opts: WriteOptions) -> Result<EventId> {
        let event_id = EventId::from(self.ids.next_id());
        let session_id = opts
            .session_id
            .or_else(|| data.session_id().map(str::to_string));
        let phase = opts.phase.or_else(|| match &data {
            EventData::ToolExecute(t) => Some(t.phase.as_str().to_string()),
            _ => None,
        });
        let component = opts
            .source_component
            .unwrap_or_else(|| default_component(&kind).to_string());

        // Millisecond precision is the envelope contract; drop the
        // sub-millisecond part so a written event equals its queried copy.
        let now = Utc::now();
        let ts = now
            .with_nanosecond(now.timestamp_subsec_millis() * 1_000_000)
            .unwrap_or(now);

        let event = Event {
            schema_version: SCHEMA_VERSION.to_string(),
            ts,
            event_id: event_id.clone(),
            machine: self.machine.clone(),
            context: Context {
                session_id,
                actor: opts.actor,
                phase,
            },
            event: EventInfo { kind, tags: opts.tags },
            source: Source {
                component,
                version: opts.source_version,
            },
            data,
            parent: opts.parent,
        };

        self.store.append(&event)?;
        Ok(event_id)
    }

    /// Record a tool invocation (`constellation:tool_execute`).
    pub fn tool_execute(&self, data: ToolExecute, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::ToolExecute, EventData::ToolExecute(data), opts)
    }

    /// Record a hook firing (`constellation:hook_fired`).
    pub fn hook_fired(&self, data: HookFired, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::HookFired, EventData::HookFired(data), opts)
    }

    /// Record a sub-agent spawn (`constellation:agent_spawned`).
    pub fn agent_spawned(&self, data: AgentSpawned, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::AgentSpawned, EventData::AgentSpawned(data), opts)
    }

    /// Record a skill load (`constellation:skill_loaded`).
    pub fn skill_loaded(&self, data: SkillLoaded, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::SkillLoaded, EventData::SkillLoaded(data), opts)
    }

    /// Record a command execution (`constellation:command_executed`).
    pub fn command_executed(&self, data: CommandExecuted, opts: WriteOptions) -> Result<EventId> {
        self.write(
            EventKind::CommandExecuted,
            EventData::CommandExecuted(data),
            opts,
        )
    }

    /// Record a plugin event (`constellation:plugin_event`).
    pub fn plugin_event(&self, data: PluginEvent, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::PluginEvent, EventData::PluginEvent(data), opts)
    }

    /// Record a failure (`error`).
    pub fn error(&self, data: ErrorData, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::Error, EventData::Error(data), opts)
    }

    /// Record a measurement (`metric`).
    pub fn metric(&self, data: MetricData, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::Metric, EventData::Metric(data), opts)
    }

    /// Record a unit of work (`span`).
    pub fn span(&self, data: SpanData, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::Span, EventData::Span(data), opts)
    }

    /// Record a session beginning (`session_start`).
    pub fn session_start(&self, data: SessionEvent, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::SessionStart, EventData::SessionStart(data), opts)
    }

    /// Record a session finishing (`session_end`).
    pub fn session_end(&self, data: SessionEvent, opts: WriteOptions) -> Result<EventId> {
        self.write(EventKind::SessionEnd, EventData::SessionEnd(data), opts)
    }

    /// Record a summary for a finished session (`session_summary`).
    pub fn session_summary(&self, data: SessionEvent, opts: WriteOptions) -> Result<EventId> {
        self.write(
            EventKind::SessionSummary,
            EventData::SessionSummary(data),
            opts,
        )
    }
}
