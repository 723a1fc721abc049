//! End-to-end tests for the telemetry store API: lifecycle, identity,
//! per-kind round-trips, filter composition, pagination, and causal
//! chaining.

use constellation_telemetry::prelude::*;
use tempfile::TempDir;

fn open_temp() -> (TempDir, Telemetry) {
    let dir = TempDir::new().unwrap();
    let tel = Telemetry::open(dir.path()).unwrap();
    (dir, tel)
}

fn tool_payload(session: &str, phase: ToolPhase, duration_ms: Option<u64>) -> ToolExecute {
    ToolExecute {
        tool_name: "db-query".into(),
        args: json!({"sql": "select 1"}),
        context_session_id: session.into(),
        phase,
        context_agent: None,
        result: duration_ms.map(|_| json!({"rows": 1})),
        duration_ms,
        error: None,
    }
}

fn metric_payload(name: &str, session: Option<&str>) -> MetricData {
    MetricData {
        metric_name: name.into(),
        value: 1.0,
        unit: "count".into(),
        context_session_id: session.map(Into::into),
        dimensions: None,
    }
}

fn session_payload(session: &str) -> SessionEvent {
    SessionEvent {
        session_id: session.into(),
        agent: Some("planner".into()),
        model: None,
        directory: None,
        parent_session_id: None,
        duration_ms: None,
        message_count: None,
        summary: None,
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn open_creates_layout() {
        let (dir, tel) = open_temp();
        assert!(dir.path().join("observability.db").exists());
        assert!(dir.path().join(".machine_id").exists());
        assert!(tel.machine_id().starts_with("machine-"));
    }

    #[test]
    fn reopen_preserves_events() {
        let dir = TempDir::new().unwrap();
        let tel = Telemetry::open(dir.path()).unwrap();
        let id = tel
            .metric(super::metric_payload("m", None), WriteOptions::default())
            .unwrap();
        tel.close().unwrap();

        let tel = Telemetry::open(dir.path()).unwrap();
        assert!(tel.get_event(&id).unwrap().is_some());
    }

    #[test]
    fn writes_after_close_fail() {
        let (_dir, tel) = open_temp();
        tel.close().unwrap();
        let err = tel
            .metric(super::metric_payload("m", None), WriteOptions::default())
            .unwrap_err();
        assert!(err.is_closed());
    }
}

// ============================================================================
// Machine identity
// ============================================================================

mod identity {
    use super::*;

    #[test]
    fn identity_is_stable_across_handles() {
        let dir = TempDir::new().unwrap();
        let first = Telemetry::open(dir.path()).unwrap();
        let id = first.machine_id().to_string();
        first.close().unwrap();

        let second = Telemetry::open(dir.path()).unwrap();
        assert_eq!(second.machine_id(), id);
    }

    #[test]
    fn deleting_identity_file_regenerates() {
        let dir = TempDir::new().unwrap();
        let first = Telemetry::open(dir.path()).unwrap();
        let id = first.machine_id().to_string();
        first.close().unwrap();

        std::fs::remove_file(dir.path().join(".machine_id")).unwrap();
        let second = Telemetry::open(dir.path()).unwrap();
        assert_ne!(second.machine_id(), id);
    }

    #[test]
    fn builder_override_wins_and_stamps_events() {
        let dir = TempDir::new().unwrap();
        let tel = Telemetry::builder()
            .path(dir.path())
            .machine_id("machine-override")
            .open()
            .unwrap();
        assert_eq!(tel.machine_id(), "machine-override");
        // Override is never persisted.
        assert!(!dir.path().join(".machine_id").exists());

        let id = tel
            .metric(metric_payload("m", None), WriteOptions::default())
            .unwrap();
        let event = tel.get_event(&id).unwrap().unwrap();
        assert_eq!(event.machine.id, "machine-override");
    }
}

// ============================================================================
// Round-trips: written envelope == queried envelope
// ============================================================================

mod round_trips {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    fn written_and_read(tel: &Telemetry, id: EventId) -> Event {
        tel.get_event(&id).unwrap().unwrap()
    }

    #[test]
    fn tool_execute_round_trip() {
        let (_dir, tel) = open_temp();
        let payload = tool_payload("S1", ToolPhase::After, Some(45));
        let id = tel
            .tool_execute(payload.clone(), WriteOptions::new().tag("db").tag("hot"))
            .unwrap();

        let event = written_and_read(&tel, id.clone());
        assert_eq!(event.event_id, id);
        assert_eq!(*event.kind(), EventKind::ToolExecute);
        assert_eq!(event.data, EventData::ToolExecute(payload));
        assert_eq!(event.event.tags, vec!["db".to_string(), "hot".to_string()]);
        // Session and phase are threaded from the payload into context.
        assert_eq!(event.context.session_id.as_deref(), Some("S1"));
        assert_eq!(event.context.phase.as_deref(), Some("after"));
        assert_eq!(event.source.component, "tool-executor");
    }

    #[test]
    fn every_typed_writer_round_trips() {
        let (_dir, tel) = open_temp();
        let opts = WriteOptions::default;

        let written: Vec<(EventId, EventData)> = vec![
            (
                tel.tool_execute(tool_payload("S1", ToolPhase::Before, None), opts())
                    .unwrap(),
                EventData::ToolExecute(tool_payload("S1", ToolPhase::Before, None)),
            ),
            (
                tel.hook_fired(
                    HookFired {
                        hook_name: "pre-commit".into(),
                        plugin_name: "git".into(),
                        context_session_id: "S1".into(),
                        event_payload: Some(json!({"files": 3})),
                        duration_ms: Some(8),
                    },
                    opts(),
                )
                .unwrap(),
                EventData::HookFired(HookFired {
                    hook_name: "pre-commit".into(),
                    plugin_name: "git".into(),
                    context_session_id: "S1".into(),
                    event_payload: Some(json!({"files": 3})),
                    duration_ms: Some(8),
                }),
            ),
            (
                tel.agent_spawned(
                    AgentSpawned {
                        agent_name: "reviewer".into(),
                        parent_session_id: "S1".into(),
                        child_session_id: "S2".into(),
                        agent_mode: AgentMode::Subagent,
                        model: Some("base-model".into()),
                        tools_enabled: Some(vec!["read".into(), "grep".into()]),
                    },
                    opts(),
                )
                .unwrap(),
                EventData::AgentSpawned(AgentSpawned {
                    agent_name: "reviewer".into(),
                    parent_session_id: "S1".into(),
                    child_session_id: "S2".into(),
                    agent_mode: AgentMode::Subagent,
                    model: Some("base-model".into()),
                    tools_enabled: Some(vec!["read".into(), "grep".into()]),
                }),
            ),
            (
                tel.skill_loaded(
                    SkillLoaded {
                        skill_name: "sql".into(),
                        skill_path: "skills/sql.md".into(),
                        context_session_id: "S1".into(),
                        context_agent: None,
                    },
                    opts(),
                )
                .unwrap(),
                EventData::SkillLoaded(SkillLoaded {
                    skill_name: "sql".into(),
                    skill_path: "skills/sql.md".into(),
                    context_session_id: "S1".into(),
                    context_agent: None,
                }),
            ),
            (
                tel.command_executed(
                    CommandExecuted {
                        command_name: "compact".into(),
                        context_session_id: "S1".into(),
                        args: None,
                        duration_ms: Some(120),
                        result: None,
                    },
                    opts(),
                )
                .unwrap(),
                EventData::CommandExecuted(CommandExecuted {
                    command_name: "compact".into(),
                    context_session_id: "S1".into(),
                    args: None,
                    duration_ms: Some(120),
                    result: None,
                }),
            ),
            (
                tel.plugin_event(
                    PluginEvent {
                        plugin_name: "git".into(),
                        event_type: "installed".into(),
                        context_session_id: None,
                        event_data: None,
                    },
                    opts(),
                )
                .unwrap(),
                EventData::PluginEvent(PluginEvent {
                    plugin_name: "git".into(),
                    event_type: "installed".into(),
                    context_session_id: None,
                    event_data: None,
                }),
            ),
            (
                tel.error(
                    ErrorData {
                        error_type: "tool_failure".into(),
                        message: "query timed out".into(),
                        context_session_id: "S1".into(),
                        retryable: true,
                        transient: true,
                        error_code: Some("E_TIMEOUT".into()),
                        tool_name: Some("db-query".into()),
                        invariants_violated: None,
                        raw_output: None,
                        recovery_actions: Some(vec!["retry with backoff".into()]),
                    },
                    opts(),
                )
                .unwrap(),
                EventData::Error(ErrorData {
                    error_type: "tool_failure".into(),
                    message: "query timed out".into(),
                    context_session_id: "S1".into(),
                    retryable: true,
                    transient: true,
                    error_code: Some("E_TIMEOUT".into()),
                    tool_name: Some("db-query".into()),
                    invariants_violated: None,
                    raw_output: None,
                    recovery_actions: Some(vec!["retry with backoff".into()]),
                }),
            ),
            (
                tel.metric(metric_payload("latency", Some("S1")), opts()).unwrap(),
                EventData::Metric(metric_payload("latency", Some("S1"))),
            ),
            (
                tel.span(
                    SpanData {
                        span_id: "sp-1".into(),
                        name: "plan".into(),
                        status: SpanStatus::Started,
                        start_ts: Utc::now(),
                        parent_span_id: None,
                        trace_id: Some("tr-1".into()),
                        end_ts: None,
                        duration_ms: None,
                        context_session_id: Some("S1".into()),
                    },
                    opts(),
                )
                .unwrap(),
                // Compared structurally below, not field-by-field: the span
                // start_ts round-trips through JSON with full precision.
                EventData::Span(SpanData {
                    span_id: "sp-1".into(),
                    name: "plan".into(),
                    status: SpanStatus::Started,
                    start_ts: Utc::now(),
                    parent_span_id: None,
                    trace_id: Some("tr-1".into()),
                    end_ts: None,
                    duration_ms: None,
                    context_session_id: Some("S1".into()),
                }),
            ),
            (
                tel.session_start(session_payload("S1"), opts()).unwrap(),
                EventData::SessionStart(session_payload("S1")),
            ),
            (
                tel.session_end(session_payload("S1"), opts()).unwrap(),
                EventData::SessionEnd(session_payload("S1")),
            ),
            (
                tel.session_summary(session_payload("S1"), opts()).unwrap(),
                EventData::SessionSummary(session_payload("S1")),
            ),
        ];

        for (id, expected) in &written {
            let event = written_and_read(&tel, id.clone());
            match (&event.data, expected) {
                // Span timestamps differ between the two constructions above;
                // check the stable fields.
                (EventData::Span(got), EventData::Span(want)) => {
                    assert_eq!(got.span_id, want.span_id);
                    assert_eq!(got.status, want.status);
                    assert_eq!(got.trace_id, want.trace_id);
                }
                (got, want) => assert_eq!(got, want),
            }
        }
    }

    #[test]
    fn custom_kind_round_trips_via_write_event() {
        let (_dir, tel) = open_temp();
        let kind = EventKind::Custom("my-plugin:cache_miss".into());
        let mut payload = Map::new();
        payload.insert("key".into(), json!("k1"));
        payload.insert("age_ms".into(), json!(40));

        let id = tel
            .write_event(kind.clone(), EventData::Custom(payload.clone()), WriteOptions::default())
            .unwrap();
        let event = tel.get_event(&id).unwrap().unwrap();
        assert_eq!(*event.kind(), kind);
        assert_eq!(event.data, EventData::Custom(payload));
    }

    #[test]
    fn write_event_rejects_kind_payload_mismatch() {
        let (_dir, tel) = open_temp();
        let err = tel
            .write_event(
                EventKind::Error,
                EventData::Metric(metric_payload("m", None)),
                WriteOptions::default(),
            )
            .unwrap_err();
        assert!(err.is_constraint());
    }
}

// ============================================================================
// Query engine: filters, ordering, pagination
// ============================================================================

mod queries {
    use super::*;

    /// Two sessions, three kinds.
    fn fixture(tel: &Telemetry) {
        for session in ["S1", "S2"] {
            tel.session_start(session_payload(session), WriteOptions::default())
                .unwrap();
            tel.tool_execute(
                tool_payload(session, ToolPhase::Before, None),
                WriteOptions::default(),
            )
            .unwrap();
            tel.metric(metric_payload("latency", Some(session)), WriteOptions::default())
                .unwrap();
        }
    }

    #[test]
    fn no_filters_returns_everything() {
        let (_dir, tel) = open_temp();
        fixture(&tel);
        assert_eq!(tel.query_events(&EventFilter::new()).unwrap().len(), 6);
    }

    #[test]
    fn kind_and_session_compose_as_intersection() {
        let (_dir, tel) = open_temp();
        fixture(&tel);

        let events = tel
            .query_events(
                &EventFilter::new()
                    .kind(EventKind::ToolExecute)
                    .session("S1"),
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(*events[0].kind(), EventKind::ToolExecute);
        assert_eq!(events[0].context.session_id.as_deref(), Some("S1"));
    }

    #[test]
    fn machine_filter_matches_resolved_identity() {
        let (_dir, tel) = open_temp();
        fixture(&tel);

        let mine = tel
            .query_events(&EventFilter::new().machine(tel.machine_id()))
            .unwrap();
        assert_eq!(mine.len(), 6);
        let none = tel
            .query_events(&EventFilter::new().machine("machine-elsewhere"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let (_dir, tel) = open_temp();
        let id = tel
            .metric(metric_payload("m", None), WriteOptions::default())
            .unwrap();
        let ts = tel.get_event(&id).unwrap().unwrap().ts;

        let hit = tel
            .query_events(&EventFilter::new().since(ts).until(ts))
            .unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].event_id, id);
    }

    #[test]
    fn results_come_back_newest_first() {
        let (_dir, tel) = open_temp();
        let ids: Vec<EventId> = (0..5)
            .map(|i| {
                tel.metric(metric_payload(&format!("m{i}"), None), WriteOptions::default())
                    .unwrap()
            })
            .collect();

        let events = tel.query_events(&EventFilter::new()).unwrap();
        let got: Vec<EventId> = events.into_iter().map(|e| e.event_id).collect();
        let want: Vec<EventId> = ids.into_iter().rev().collect();
        assert_eq!(got, want);
    }

    #[test]
    fn pagination_windows_do_not_overlap() {
        let (_dir, tel) = open_temp();
        let ids: Vec<EventId> = (0..10)
            .map(|i| {
                tel.metric(metric_payload(&format!("m{i}"), None), WriteOptions::default())
                    .unwrap()
            })
            .collect();
        // Descending rank: last written first.
        let ranked: Vec<EventId> = ids.into_iter().rev().collect();

        let window = |limit: u32, offset: u32| -> Vec<EventId> {
            tel.query_events(&EventFilter::new().limit(limit).offset(offset))
                .unwrap()
                .into_iter()
                .map(|e| e.event_id)
                .collect()
        };

        assert_eq!(window(3, 0), ranked[0..3]);
        assert_eq!(window(3, 3), ranked[3..6]);
        assert_eq!(window(3, 6), ranked[6..9]);
    }

    #[test]
    fn offset_without_limit_skips_ranked_events() {
        let (_dir, tel) = open_temp();
        fixture(&tel);
        let events = tel
            .query_events(&EventFilter::new().offset(4))
            .unwrap();
        assert_eq!(events.len(), 2);
    }
}

// ============================================================================
// Spec scenarios: before/after tool pair, causal chaining
// ============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn tool_before_after_pair_on_one_session() {
        let (_dir, tel) = open_temp();

        tel.tool_execute(
            tool_payload("S1", ToolPhase::Before, None),
            WriteOptions::default(),
        )
        .unwrap();
        tel.tool_execute(
            tool_payload("S1", ToolPhase::After, Some(45)),
            WriteOptions::default(),
        )
        .unwrap();

        let events = tel
            .query_events(&EventFilter::new().session("S1"))
            .unwrap();
        assert_eq!(events.len(), 2);

        // Most recent first: the "after" event leads.
        let (after, before) = (&events[0], &events[1]);
        match (&after.data, &before.data) {
            (EventData::ToolExecute(a), EventData::ToolExecute(b)) => {
                assert_eq!(a.phase, ToolPhase::After);
                assert_eq!(a.duration_ms, Some(45));
                assert_eq!(b.phase, ToolPhase::Before);
                assert_eq!(b.duration_ms, None);
            }
            other => panic!("expected two tool events, got {other:?}"),
        }
    }

    #[test]
    fn parent_event_id_threads_causal_chain() {
        let (_dir, tel) = open_temp();

        let cause = tel
            .tool_execute(tool_payload("S1", ToolPhase::After, Some(45)), WriteOptions::default())
            .unwrap();
        let effect = tel
            .error(
                ErrorData {
                    error_type: "tool_failure".into(),
                    message: "bad rows".into(),
                    context_session_id: "S1".into(),
                    retryable: false,
                    transient: false,
                    error_code: None,
                    tool_name: Some("db-query".into()),
                    invariants_violated: None,
                    raw_output: None,
                    recovery_actions: None,
                },
                WriteOptions::new().caused_by(cause.clone()),
            )
            .unwrap();

        let event = tel.get_event(&effect).unwrap().unwrap();
        assert_eq!(event.parent.event_id.as_ref(), Some(&cause));
    }

    #[test]
    fn trace_and_span_links_survive_round_trip() {
        let (_dir, tel) = open_temp();
        let id = tel
            .metric(
                metric_payload("m", Some("S1")),
                WriteOptions::new().trace("tr-9").span("sp-3"),
            )
            .unwrap();
        let event = tel.get_event(&id).unwrap().unwrap();
        assert_eq!(event.parent.trace_id.as_deref(), Some("tr-9"));
        assert_eq!(event.parent.span_id.as_deref(), Some("sp-3"));
    }
}
