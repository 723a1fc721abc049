//! Unified error types for the telemetry store.
//!
//! This module provides the canonical error type for all store operations.
//! Failures always surface synchronously to the immediate caller; the store
//! performs no automatic retries and no silent recovery.

use thiserror::Error;

/// All telemetry store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying SQLite error (storage fault, duplicate primary key, etc.)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error (unwritable data directory, identity file fault)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload serialization or deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store handle has been closed; no further reads or writes
    #[error("store is closed")]
    Closed,

    /// Constraint violation (invalid input, malformed kind, bad tag)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A persisted row could not be mapped back into an envelope
    #[error("corrupt event row {event_id}: {reason}")]
    CorruptRow {
        /// Primary key of the offending row
        event_id: String,
        /// What failed to parse
        reason: String,
    },
}

/// Result type for telemetry store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from the storage engine.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Io(_))
    }

    /// Check if this error is a use-after-close.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// Check if this error is a caller-side contract violation.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }
}
