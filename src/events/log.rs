//! # Append-only event log.
//!
//! [`EventLog`] records every emitted event twice: in an in-memory history
//! owned by the bus instance, and (optionally) as one JSON line appended to a
//! file.
//!
//! ## Rules
//! - **Append-only**: records are never rewritten or removed.
//! - **History first**: the in-memory copy is kept even if the file append fails.
//! - **Best effort**: no fsync; a crash mid-write can leave a torn last line,
//!   which replay reports as malformed and skips.
//! - **Serialized writers**: appends from one log instance never interleave.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::error::BusError;
use crate::events::EventRecord;

/// Durable record of emitted events.
#[derive(Debug)]
pub struct EventLog {
    path: Option<PathBuf>,
    history: Mutex<Vec<EventRecord>>,
    write_lock: Mutex<()>,
}

impl EventLog {
    /// Creates a log that appends to `path` (created on first append).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_path(Some(path.into()))
    }

    /// Creates a log that only keeps the in-memory history.
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    pub(crate) fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            history: Mutex::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records one event and returns it.
    ///
    /// The record always lands in the history; `Err` only reports that the
    /// file append failed.
    pub fn append(&self, topic: &str, payload: &Value) -> (EventRecord, Result<(), BusError>) {
        let record = EventRecord::now(topic, payload.clone());
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        let res = match &self.path {
            Some(path) => self.write_line(path, &record),
            None => Ok(()),
        };
        (record, res)
    }

    fn write_line(&self, path: &Path, record: &EventRecord) -> Result<(), BusError> {
        let to_err = |source: std::io::Error| BusError::LogWrite {
            path: path.to_path_buf(),
            source,
        };
        let line = record.to_line().map_err(|e| to_err(e.into()))?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(to_err)?;
        file.write_all(&line).map_err(to_err)?;
        file.flush().map_err(to_err)
    }

    /// Snapshot of every record appended through this instance.
    pub fn history(&self) -> Vec<EventRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
