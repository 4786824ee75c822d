//! # Event records as written to and read from the event log.
//!
//! Each line of the event log is one JSON object:
//! ```text
//! {"timestamp":"2026-10-16T09:12:03.120Z","event":"order.created","data":{"order_id":1}}
//! ```
//!
//! Replay reads lines back as [`ReplayEntry`], which only needs `event` and
//! `data`; the timestamp is informational and may be in any format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One emitted event. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Wall-clock time of the emit.
    pub timestamp: DateTime<Utc>,
    /// Topic the event was emitted on.
    pub event: String,
    /// Arbitrary structured payload.
    pub data: Value,
}

impl EventRecord {
    /// Creates a record stamped with the current time.
    pub fn now(event: impl Into<String>, data: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            data,
        }
    }

    /// Serializes the record as one log line (with trailing `\n`).
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// What replay needs from a log line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayEntry {
    /// Topic to re-dispatch.
    pub event: String,
    /// Payload; missing `data` replays as `null`.
    #[serde(default)]
    pub data: Value,
}

impl ReplayEntry {
    /// Parses one log line. Blank lines yield `Ok(None)`.
    pub fn parse(line_no: usize, raw: &[u8]) -> Result<Option<Self>, MalformedRecord> {
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice::<ReplayEntry>(trimmed)
            .map(Some)
            .map_err(|e| MalformedRecord {
                line: line_no,
                reason: e.to_string(),
                raw: String::from_utf8_lossy(trimmed).into_owned(),
            })
    }
}

/// A log line that replay skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// 1-based line number in the replay source.
    pub line: usize,
    /// Parser message.
    pub reason: String,
    /// The offending line (lossy UTF-8).
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_is_newline_terminated_json() {
        let rec = EventRecord::now("order.created", json!({"order_id": 1}));
        let line = rec.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let back: EventRecord = serde_json::from_slice(&line).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn replay_entry_ignores_timestamp_format() {
        let raw = br#"{"timestamp": "16-10-2026 09:12:03", "event": "order.paid", "data": {"order_id": 1}}"#;
        let entry = ReplayEntry::parse(1, raw).unwrap().unwrap();
        assert_eq!(entry.event, "order.paid");
        assert_eq!(entry.data, json!({"order_id": 1}));
    }

    #[test]
    fn blank_and_malformed_lines() {
        assert_eq!(ReplayEntry::parse(1, b"   \n").unwrap(), None);

        let err = ReplayEntry::parse(3, b"{not json").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.raw, "{not json");

        let missing_event = ReplayEntry::parse(4, br#"{"data": 1}"#).unwrap_err();
        assert_eq!(missing_event.line, 4);
    }
}
