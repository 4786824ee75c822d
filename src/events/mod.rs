//! Event records and the append-only event log.
//!
//! This module groups the persisted **data model** of emitted events and the
//! **log** that records them.
//!
//! ## Contents
//! - [`EventRecord`] one emitted event: `{timestamp, event, data}`
//! - [`EventLog`] append-only JSON-lines file plus in-memory history
//! - [`ReplayEntry`], [`MalformedRecord`] what a replay reads back
//!
//! ## Quick reference
//! - **Writer**: `EventBus::emit` (one append per emit, before dispatch).
//! - **Reader**: `EventBus::replay` (never appends; resolves against the
//!   current subscription table).

mod log;
mod record;

pub use log::EventLog;
pub use record::{EventRecord, MalformedRecord, ReplayEntry};
