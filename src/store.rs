//! SQLite-backed append-only event store.
//!
//! The store exclusively owns `<dataDir>/observability.db`. Schema setup is
//! idempotent (create-if-absent, never destructive), appends are single
//! atomic inserts, and the connection lives behind a mutex so concurrent
//! in-process writers serialize at the commit. WAL mode lets readers run
//! while a write is in flight without ever observing a partial row.
//!
//! Cross-process safety is not coordinated here: two processes pointing at
//! the same data directory rely entirely on SQLite's own file locking.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, ToSql};

use crate::error::{Error, Result};
use crate::event::{Context, Event, EventData, EventId, EventInfo, EventKind, Machine, Parent, Source};
use crate::query::EventFilter;

/// Database file name, relative to the data directory.
pub const DB_FILE: &str = "observability.db";

/// Timestamp storage format: ISO-8601 UTC with millisecond precision.
/// Lexicographic order of stored strings equals chronological order, so the
/// timestamp index serves range filters directly.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_COLS: &str = "event_id, schema_version, ts, machine_id, hostname, \
     session_id, actor, phase, kind, tags, source_component, source_version, \
     data, parent_event_id, trace_id, span_id";

/// The persistent event table and its write/read paths.
pub struct Store {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open (creating if absent) the event database under `data_dir`.
    ///
    /// Re-running against an existing directory applies only idempotent
    /// schema statements and never destroys data.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(DB_FILE);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!(path = %path.display(), "opened event store");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event. A single atomic insert: a duplicate primary key or
    /// storage fault fails this call and propagates to the caller; nothing
    /// is retried or dropped inside the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        let data = serde_json::to_string(&event.data)?;
        let tags = flatten_tags(&event.event.tags)?;
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;

        conn.execute(
            "INSERT INTO events (event_id, schema_version, ts, machine_id, hostname, \
             session_id, actor, phase, kind, tags, source_component, source_version, \
             data, parent_event_id, trace_id, span_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                event.event_id.as_str(),
                event.schema_version,
                format_ts(&event.ts),
                event.machine.id,
                event.machine.hostname,
                event.context.session_id,
                event.context.actor,
                event.context.phase,
                event.event.kind.as_str(),
                tags,
                event.source.component,
                event.source.version,
                data,
                event.parent.event_id.as_ref().map(EventId::as_str),
                event.parent.trace_id,
                event.parent.span_id,
            ],
        )?;
        Ok(())
    }

    /// Fetch a single event by id.
    pub fn get(&self, event_id: &EventId) -> Result<Option<Event>> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;

        let mut stmt =
            conn.prepare(&format!("SELECT {SELECT_COLS} FROM events WHERE event_id = ?1"))?;
        let raw = stmt
            .query_row(params![event_id.as_str()], RawRow::from_row)
            .optional()?;
        raw.map(RawRow::into_event).transpose()
    }

    /// Run a filtered query. Filters are conjunctive; results come back
    /// ordered most recent first (timestamp, then event id as the
    /// same-millisecond tie-break), with limit/offset applied after
    /// ordering.
    pub fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut sql = format!("SELECT {SELECT_COLS} FROM events");
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(kind) = &filter.kind {
            clauses.push("kind = ?");
            values.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(session) = &filter.session_id {
            clauses.push("session_id = ?");
            values.push(Box::new(session.clone()));
        }
        if let Some(machine) = &filter.machine_id {
            clauses.push("machine_id = ?");
            values.push(Box::new(machine.clone()));
        }
        if let Some(since) = &filter.since {
            clauses.push("ts >= ?");
            values.push(Box::new(format_ts(since)));
        }
        if let Some(until) = &filter.until {
            clauses.push("ts <= ?");
            values.push(Box::new(format_ts(until)));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" ORDER BY ts DESC, event_id DESC LIMIT ? OFFSET ?");
        values.push(Box::new(filter.limit.map_or(-1i64, i64::from)));
        values.push(Box::new(i64::from(filter.offset.unwrap_or(0))));

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params.as_slice(), RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRow::into_event).collect()
    }

    /// Release the connection. Idempotent; any later append or query fails
    /// with [`Error::Closed`] instead of touching a dangling handle.
    pub fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            drop(conn);
            tracing::debug!(path = %self.path.display(), "closed event store");
        }
        Ok(())
    }
}

/// Serialize a timestamp to its stored form, truncating to milliseconds.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Join tags into the flattened storage form. Commas are the separator, so
/// a comma inside a tag would corrupt the list on read and is rejected.
fn flatten_tags(tags: &[String]) -> Result<Option<String>> {
    if tags.is_empty() {
        return Ok(None);
    }
    if let Some(bad) = tags.iter().find(|t| t.contains(',')) {
        return Err(Error::ConstraintViolation(format!(
            "tag '{bad}' contains a comma"
        )));
    }
    Ok(Some(tags.join(",")))
}

/// One row read back from the events table, before envelope reconstruction.
struct RawRow {
    event_id: String,
    schema_version: String,
    ts: String,
    machine_id: String,
    hostname: Option<String>,
    session_id: Option<String>,
    actor: Option<String>,
    phase: Option<String>,
    kind: String,
    tags: Option<String>,
    source_component: String,
    source_version: Option<String>,
    data: String,
    parent_event_id: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            schema_version: row.get(1)?,
            ts: row.get(2)?,
            machine_id: row.get(3)?,
            hostname: row.get(4)?,
            session_id: row.get(5)?,
            actor: row.get(6)?,
            phase: row.get(7)?,
            kind: row.get(8)?,
            tags: row.get(9)?,
            source_component: row.get(10)?,
            source_version: row.get(11)?,
            data: row.get(12)?,
            parent_event_id: row.get(13)?,
            trace_id: row.get(14)?,
            span_id: row.get(15)?,
        })
    }

    /// Rebuild the full envelope: parse the timestamp, split the flattened
    /// tags back into a list, and deserialize the payload into the typed
    /// variant for its kind.
    fn into_event(self) -> Result<Event> {
        let corrupt = |reason: String| Error::CorruptRow {
            event_id: self.event_id.clone(),
            reason,
        };

        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .map_err(|e| corrupt(format!("bad timestamp '{}': {e}", self.ts)))?
            .with_timezone(&Utc);
        let kind = EventKind::parse(&self.kind)
            .map_err(|e| corrupt(format!("bad kind '{}': {e}", self.kind)))?;
        let value: serde_json::Value = serde_json::from_str(&self.data)
            .map_err(|e| corrupt(format!("bad payload json: {e}")))?;
        let data = EventData::from_kind_value(&kind, value)
            .map_err(|e| corrupt(format!("payload does not satisfy '{kind}' contract: {e}")))?;

        let tags = self
            .tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Event {
            schema_version: self.schema_version,
            ts,
            event_id: EventId::from(self.event_id),
            machine: Machine {
                id: self.machine_id,
                hostname: self.hostname,
            },
            context: Context {
                session_id: self.session_id,
                actor: self.actor,
                phase: self.phase,
            },
            event: EventInfo { kind, tags },
            source: Source {
                component: self.source_component,
                version: self.source_version,
            },
            data,
            parent: Parent {
                event_id: self.parent_event_id.map(EventId::from),
                trace_id: self.trace_id,
                span_id: self.span_id,
            },
        })
    }
}
