//! Error types used by the bus, the dispatch worker and the log store.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`BusError`]: errors raised by the in-process event bus.
//! - [`SubscriberError`]: errors returned by subscriber callbacks.
//! - [`StoreError`]: errors raised by the partitioned log store and consumer groups.
//! - [`QueueError`]: transient dispatch-queue access errors seen by the worker.
//!
//! Every type provides `as_label` (stable snake_case label for logs).
//! None of them ever crosses from the dispatch path back to a producer: the
//! bus logs them and keeps going.

use std::path::PathBuf;
use thiserror::Error;

use crate::subscribers::SubscriberId;

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// `unsubscribe` was called for a subscriber that is not registered on that key.
    #[error("subscriber '{subscriber}' ({id}) is not subscribed to '{topic}'")]
    NotSubscribed {
        /// Topic or pattern the removal was requested for.
        topic: String,
        /// Diagnostic name of the subscriber.
        subscriber: String,
        /// Stable identity of the subscriber handle.
        id: SubscriberId,
    },

    /// Appending to the event log failed; dispatch continued regardless.
    #[error("event log append to {path:?} failed: {source}")]
    LogWrite {
        /// Event log path.
        path: PathBuf,
        /// Underlying I/O or serialization error.
        #[source]
        source: std::io::Error,
    },

    /// The replay source could not be opened.
    #[error("replay source {path:?} unavailable: {source}")]
    ReplaySource {
        /// Replay file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The dispatch queue refused the task (receiver gone).
    #[error("dispatch queue closed; task for '{topic}' dropped")]
    Enqueue {
        /// Topic of the dropped task.
        topic: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use logbus::BusError;
    ///
    /// let err = BusError::Enqueue { topic: "order.created".into() };
    /// assert_eq!(err.as_label(), "bus_enqueue_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotSubscribed { .. } => "bus_not_subscribed",
            BusError::LogWrite { .. } => "bus_log_write_failed",
            BusError::ReplaySource { .. } => "bus_replay_source",
            BusError::Enqueue { .. } => "bus_enqueue_failed",
        }
    }
}

/// # Errors returned by subscriber callbacks.
///
/// The worker isolates these per subscriber: a failure is logged with the
/// subscriber identity and topic and the remaining subscribers still run.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    /// The callback failed while handling the event.
    #[error("subscriber failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl SubscriberError {
    /// Shorthand for [`SubscriberError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        SubscriberError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriberError::Fail { .. } => "subscriber_failed",
        }
    }
}

/// # Errors produced by the log store and consumer groups.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Segment or offset file could not be read or written.
    #[error("io error on {path:?}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A segment line could not be parsed; it is skipped, never retried.
    #[error("malformed record in '{topic}' at byte {offset}: {reason}")]
    Malformed {
        /// Topic whose segment holds the line.
        topic: String,
        /// Byte offset where the line starts.
        offset: u64,
        /// Parser message.
        reason: String,
    },

    /// Topic name cannot be mapped onto a segment file.
    #[error("invalid topic name {0:?}")]
    InvalidTopic(String),

    /// Group id cannot be mapped onto an offset directory.
    #[error("invalid consumer group id {0:?}")]
    InvalidGroup(String),

    /// The message could not be serialized into a segment line.
    #[error("cannot serialize message for '{topic}': {source}")]
    Serialize {
        /// Target topic.
        topic: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use logbus::StoreError;
    ///
    /// let err = StoreError::InvalidTopic("../etc".into());
    /// assert_eq!(err.as_label(), "store_invalid_topic");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "store_io",
            StoreError::Malformed { .. } => "store_malformed_record",
            StoreError::InvalidTopic(_) => "store_invalid_topic",
            StoreError::InvalidGroup(_) => "store_invalid_group",
            StoreError::Serialize { .. } => "store_serialize",
        }
    }

    /// Indicates whether the failure is transient I/O (the operation degrades and may succeed later).
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// # Transient dispatch-queue access errors.
///
/// The worker never exits on these: it logs, backs off and retries.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Another consumer currently holds the receiving end.
    #[error("dispatch queue receiver is held by another consumer")]
    Contended,

    /// The channel reported closed.
    #[error("dispatch queue closed")]
    Closed,
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Contended => "queue_contended",
            QueueError::Closed => "queue_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_only_for_io() {
        let io = StoreError::io("x.log", std::io::Error::other("disk"));
        assert!(io.is_transient());
        assert_eq!(io.as_label(), "store_io");

        let bad = StoreError::Malformed {
            topic: "orders".into(),
            offset: 12,
            reason: "eof".into(),
        };
        assert!(!bad.is_transient());
        assert!(bad.to_string().contains("byte 12"));
    }

    #[test]
    fn subscriber_error_message() {
        let err = SubscriberError::fail("smtp down");
        assert_eq!(err.to_string(), "subscriber failed: smtp down");
        assert_eq!(err.as_label(), "subscriber_failed");
    }
}
