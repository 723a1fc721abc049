//! Telemetry store entry point.
//!
//! One [`Telemetry`] handle is constructed per process (typically at
//! startup) and passed by reference to every component that records or
//! queries events. The handle owns the SQLite store, the id generator, and
//! the resolved machine identity for its data directory; dropping or
//! closing it releases the database.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::event::{Event, EventId, Machine};
use crate::id::EventIdGenerator;
use crate::identity::resolve_machine_id;
use crate::query::EventFilter;
use crate::store::Store;

/// The telemetry store.
///
/// # Example
///
/// ```ignore
/// use constellation_telemetry::prelude::*;
///
/// let tel = Telemetry::open("./.constellation")?;
///
/// let before = tel.tool_execute(
///     ToolExecute {
///         tool_name: "db-query".into(),
///         args: json!({"sql": "select 1"}),
///         context_session_id: "S1".into(),
///         phase: ToolPhase::Before,
///         context_agent: None,
///         result: None,
///         duration_ms: None,
///         error: None,
///     },
///     WriteOptions::default(),
/// )?;
///
/// let session = tel.query_events(&EventFilter::new().session("S1"))?;
/// tel.close()?;
/// ```
pub struct Telemetry {
    pub(crate) store: Store,
    pub(crate) ids: EventIdGenerator,
    pub(crate) machine: Machine,
    data_dir: PathBuf,
}

impl Telemetry {
    /// Open the telemetry store under `data_dir` with default settings.
    ///
    /// Creates the directory, resolves (or generates) the machine identity,
    /// and opens the event database, creating it if absent.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::builder().path(data_dir).open()
    }

    /// Create a builder for store configuration.
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::new()
    }

    /// The resolved machine identity for this data directory.
    pub fn machine_id(&self) -> &str {
        &self.machine.id
    }

    /// The data directory this handle owns.
    pub fn path(&self) -> &Path {
        &self.data_dir
    }

    /// Fetch a single event by id.
    pub fn get_event(&self, event_id: &EventId) -> Result<Option<Event>> {
        self.store.get(event_id)
    }

    /// Run a filtered query; see [`EventFilter`] for the filter contract.
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.store.query(filter)
    }

    /// Close the store. Idempotent; subsequent reads and writes fail with
    /// [`Error::Closed`](crate::Error::Closed).
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}

/// Builder for telemetry store configuration.
///
/// # Example
///
/// ```ignore
/// let tel = Telemetry::builder()
///     .path("./.constellation")
///     .machine_id("machine-ci-runner")   // override, not persisted
///     .open()?;
/// ```
pub struct TelemetryBuilder {
    path: Option<PathBuf>,
    machine_id: Option<String>,
    hostname: Option<String>,
}

impl TelemetryBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            path: None,
            machine_id: None,
            hostname: None,
        }
    }

    /// Set the data directory.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the machine identity. Takes precedence over both the
    /// `CONSTELLATION_MACHINE_ID` environment variable and the persisted
    /// identity file, and is never written to disk.
    pub fn machine_id(mut self, id: impl Into<String>) -> Self {
        self.machine_id = Some(id.into());
        self
    }

    /// Set the hostname recorded on every event. Defaults to the `HOSTNAME`
    /// environment variable when present.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Open the store.
    pub fn open(self) -> Result<Telemetry> {
        let data_dir = self.path.unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&data_dir)?;

        let machine_id = resolve_machine_id(&data_dir, self.machine_id.as_deref())?;
        let hostname = self
            .hostname
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()));
        let store = Store::open(&data_dir)?;
        tracing::info!(
            data_dir = %data_dir.display(),
            machine_id = %machine_id,
            "telemetry store opened"
        );

        Ok(Telemetry {
            store,
            ids: EventIdGenerator::new(),
            machine: Machine {
                id: machine_id,
                hostname,
            },
            data_dir,
        })
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
