//! # Consumer groups over the partitioned log store.
//!
//! A [`ConsumerGroup`] keeps one byte offset per subscribed topic and reads
//! everything appended past it.
//!
//! ```text
//! orders.log:  {"order_id":1}\n{"order_id":2}\n{"order_id":3
//!              ^ offset 0                      ^ offset 28 (complete lines end here)
//!
//! fetch()  ─► records for lines in [offset, 28), next_offset = 28
//! commit() ─► OffsetStore::save("orders", 28) ─► in-memory offset = 28
//! poll()   = fetch() + commit()
//! ```
//!
//! ## Rules
//! - Only newline-terminated lines are consumed; a trailing fragment waits for
//!   the rest of its record.
//! - A malformed line is skipped with a warning, but its bytes still advance the offset.
//! - Offsets only move forward, and only after they have been persisted.
//! - A missing segment is skipped silently; any other read error skips the
//!   topic for this round and the other topics still run.
//! - Records fetched but never committed are delivered again (at-least-once).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::LogStore;
use crate::store::log_store::check_topic;
use crate::store::offsets::OffsetStore;

/// Key added by [`PolledRecord::tagged`].
pub const TOPIC_TAG: &str = "__topic__";

/// One record read from a topic segment.
#[derive(Clone, Debug, PartialEq)]
pub struct PolledRecord {
    /// Source topic.
    pub topic: String,
    /// Byte offset at which the record's line starts.
    pub offset: u64,
    /// Record as stored.
    pub payload: Value,
}

impl PolledRecord {
    /// The payload with a `"__topic__"` key naming the source topic.
    ///
    /// Non-object payloads are returned unchanged.
    pub fn tagged(&self) -> Value {
        let mut value = self.payload.clone();
        if let Value::Object(map) = &mut value {
            map.insert(TOPIC_TAG.to_owned(), Value::String(self.topic.clone()));
        }
        value
    }
}

/// Records fetched by [`ConsumerGroup::fetch`] plus the offsets to commit for them.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    records: Vec<PolledRecord>,
    next_offsets: Vec<(String, u64)>,
}

impl Batch {
    /// Records in topic order, then segment order.
    pub fn records(&self) -> &[PolledRecord] {
        &self.records
    }

    /// Consumes the batch into its records.
    pub fn into_records(self) -> Vec<PolledRecord> {
        self.records
    }

    /// `(topic, offset)` pairs a commit would persist.
    pub fn next_offsets(&self) -> &[(String, u64)] {
        &self.next_offsets
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Named reader with persisted per-topic offsets.
#[derive(Debug)]
pub struct ConsumerGroup {
    store: LogStore,
    offsets: OffsetStore,
    group_id: String,
    topics: Vec<String>,
    positions: HashMap<String, u64>,
}

impl ConsumerGroup {
    pub(crate) fn open(store: LogStore, group_id: &str) -> Result<Self, StoreError> {
        let offsets = OffsetStore::open(&store.config().offset_dir, group_id)?;
        let loaded = offsets.load_all()?;

        let topics: Vec<String> = loaded.keys().cloned().collect();
        let positions: HashMap<String, u64> = loaded.into_iter().collect();
        info!(group = group_id, topics = ?topics, "consumer group opened");

        Ok(Self {
            store,
            offsets,
            group_id: group_id.to_owned(),
            topics,
            positions,
        })
    }

    /// Group name.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Subscribed topics: persisted ones (sorted) first, then in subscription order.
    pub fn subscriptions(&self) -> &[String] {
        &self.topics
    }

    /// Current committed offset of `topic` (`0` if never committed).
    pub fn offset(&self, topic: &str) -> u64 {
        self.positions.get(topic).copied().unwrap_or(0)
    }

    /// Registers interest in `topic`; returns `false` if already subscribed.
    pub fn subscribe(&mut self, topic: &str) -> Result<bool, StoreError> {
        check_topic(topic)?;
        if self.topics.iter().any(|t| t == topic) {
            return Ok(false);
        }
        self.topics.push(topic.to_owned());
        let offset = *self.positions.entry(topic.to_owned()).or_insert(0);
        info!(group = %self.group_id, topic, offset, "subscribed");
        Ok(true)
    }

    /// Reads everything past the committed offsets without moving them.
    ///
    /// `None` reads every subscribed topic. Named topics the group has never
    /// seen start at offset 0; a topic named more than once is read once.
    pub fn fetch(&self, topics: Option<&[&str]>) -> Batch {
        let mut requested: Vec<&str> = match topics {
            Some(list) => list.to_vec(),
            None => self.topics.iter().map(String::as_str).collect(),
        };
        let mut seen = HashSet::new();
        requested.retain(|topic| seen.insert(*topic));

        let mut batch = Batch::default();
        for topic in requested {
            let from = self.offset(topic);
            match self.read_topic(topic, from) {
                Ok(Some((records, next))) => {
                    if next > from {
                        batch.next_offsets.push((topic.to_owned(), next));
                    }
                    batch.records.extend(records);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(group = %self.group_id, topic, offset = from, error = %e, label = e.as_label(), "skipping topic");
                }
            }
        }
        batch
    }

    /// Persists the offsets of `batch`.
    ///
    /// Each topic is committed independently; a topic whose offset file cannot
    /// be written keeps its old offset and its records will be fetched again.
    /// The first such failure is returned after every topic was attempted.
    pub fn commit(&mut self, batch: &Batch) -> Result<(), StoreError> {
        let mut first_err = None;
        for (topic, next) in &batch.next_offsets {
            if *next <= self.offset(topic) {
                continue;
            }
            match self.offsets.save(topic, *next) {
                Ok(()) => {
                    self.positions.insert(topic.clone(), *next);
                    if !self.topics.contains(topic) {
                        self.topics.push(topic.clone());
                    }
                    debug!(group = %self.group_id, topic = %topic, offset = next, "offset committed");
                }
                Err(e) => {
                    warn!(group = %self.group_id, topic = %topic, offset = next, error = %e, "offset commit failed");
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fetches new records and commits their offsets before returning them.
    ///
    /// A commit failure is logged; the records are still returned and will be
    /// delivered again by a later poll.
    pub fn poll(&mut self, topics: Option<&[&str]>) -> Vec<PolledRecord> {
        let batch = self.fetch(topics);
        // failures are already logged per topic
        let _ = self.commit(&batch);
        if !batch.is_empty() {
            info!(group = %self.group_id, records = batch.len(), "polled");
        }
        batch.into_records()
    }

    /// Complete records of `topic` from `from`, plus the offset just past them.
    ///
    /// `Ok(None)` means nothing to read: no segment, or `from` beyond its end.
    fn read_topic(&self, topic: &str, from: u64) -> Result<Option<(Vec<PolledRecord>, u64)>, StoreError> {
        let path = self.store.segment_path(topic)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let len = file.metadata().map_err(|e| StoreError::io(&path, e))?.len();
        if from > len {
            warn!(group = %self.group_id, topic, offset = from, len, "offset beyond segment end");
            return Ok(None);
        }

        file.seek(SeekFrom::Start(from))
            .map_err(|e| StoreError::io(&path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| StoreError::io(&path, e))?;

        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(last) => &buf[..=last],
            None => return Ok(Some((Vec::new(), from))),
        };

        let mut records = Vec::new();
        let mut pos = from;
        for line in complete.split_inclusive(|b| *b == b'\n') {
            let start = pos;
            pos += line.len() as u64;

            let body = line.trim_ascii();
            if body.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Value>(body) {
                Ok(payload) => records.push(PolledRecord {
                    topic: topic.to_owned(),
                    offset: start,
                    payload,
                }),
                Err(e) => {
                    let err = StoreError::Malformed {
                        topic: topic.to_owned(),
                        offset: start,
                        reason: e.to_string(),
                    };
                    warn!(group = %self.group_id, error = %err, label = err.as_label(), "skipping record");
                }
            }
        }
        Ok(Some((records, pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use serde_json::json;
    use std::fs::OpenOptions;
    use std::io::Write;

    fn store() -> (tempfile::TempDir, LogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(StoreConfig::under(dir.path())).unwrap();
        (dir, store)
    }

    fn append_raw(store: &LogStore, topic: &str, bytes: &[u8]) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(store.segment_path(topic).unwrap())
            .unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn poll_advances_by_bytes_and_persists() {
        let (_dir, store) = store();
        let producer = store.producer();
        let mut group = store.consumer("billing").unwrap();
        group.subscribe("orders").unwrap();

        let n1 = producer.send("orders", &json!({"order_id": 1})).unwrap();
        let n2 = producer.send("orders", &json!({"order_id": 2})).unwrap();

        let records = group.poll(None);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[1].offset, n1);
        assert_eq!(group.offset("orders"), n1 + n2);

        assert!(group.poll(None).is_empty());

        let reopened = store.consumer("billing").unwrap();
        assert_eq!(reopened.offset("orders"), n1 + n2);
        assert_eq!(reopened.subscriptions(), ["orders".to_string()]);
    }

    #[test]
    fn trailing_fragment_waits_for_newline() {
        let (_dir, store) = store();
        let mut group = store.consumer("g").unwrap();
        group.subscribe("orders").unwrap();

        append_raw(&store, "orders", b"{\"a\":1}\n{\"a\":");
        let first = group.poll(None);
        assert_eq!(first.len(), 1);
        assert_eq!(group.offset("orders"), 8);

        append_raw(&store, "orders", b"2}\n");
        let second = group.poll(None);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].payload, json!({"a": 2}));
        assert_eq!(group.offset("orders"), store.segment_len("orders").unwrap());
    }

    #[test]
    fn malformed_lines_are_skipped_but_counted() {
        let (_dir, store) = store();
        let mut group = store.consumer("g").unwrap();
        group.subscribe("orders").unwrap();

        append_raw(&store, "orders", b"{\"a\":1}\nnot json\n\n{\"a\":3}\n");
        let records = group.poll(None);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].payload, json!({"a": 3}));
        assert_eq!(group.offset("orders"), store.segment_len("orders").unwrap());
    }

    #[test]
    fn fetch_without_commit_redelivers() {
        let (_dir, store) = store();
        store.producer().send("orders", &json!({"id": 1})).unwrap();
        let mut group = store.consumer("g").unwrap();
        group.subscribe("orders").unwrap();

        let batch = group.fetch(None);
        assert_eq!(batch.len(), 1);
        assert_eq!(group.offset("orders"), 0);
        assert_eq!(group.fetch(None).len(), 1);

        group.commit(&batch).unwrap();
        assert!(group.fetch(None).is_empty());
        group.commit(&batch).unwrap();
        assert_eq!(group.offset("orders"), store.segment_len("orders").unwrap());
    }

    #[test]
    fn missing_segment_and_explicit_topics() {
        let (_dir, store) = store();
        store.producer().send("payments", &json!({"p": 1})).unwrap();
        let mut group = store.consumer("g").unwrap();
        group.subscribe("orders").unwrap();

        assert!(group.poll(None).is_empty());
        let records = group.poll(Some(&["payments", "orders"]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tagged(), json!({"p": 1, "__topic__": "payments"}));
        assert_eq!(group.subscriptions(), ["orders".to_string(), "payments".to_string()]);
    }

    #[test]
    fn repeated_topic_is_read_once() {
        let (_dir, store) = store();
        let n = store.producer().send("orders", &json!({"id": 1})).unwrap();
        let mut group = store.consumer("g").unwrap();

        let records = group.poll(Some(&["orders", "orders"]));
        assert_eq!(records.len(), 1);
        assert_eq!(group.offset("orders"), n);
        assert_eq!(group.subscriptions(), ["orders".to_string()]);
    }

    #[test]
    fn offset_past_end_is_skipped() {
        let (_dir, store) = store();
        store.producer().send("orders", &json!({"id": 1})).unwrap();
        let offsets = OffsetStore::open(&store.config().offset_dir, "g").unwrap();
        offsets.save("orders", 10_000).unwrap();

        let mut group = store.consumer("g").unwrap();
        assert!(group.poll(None).is_empty());
        assert_eq!(group.offset("orders"), 10_000);
    }

    #[test]
    fn tagged_leaves_scalars_alone() {
        let record = PolledRecord {
            topic: "t".into(),
            offset: 0,
            payload: json!(5),
        };
        assert_eq!(record.tagged(), json!(5));
        assert_eq!(record.payload, json!(5));
    }

    #[test]
    fn subscribe_is_idempotent() {
        let (_dir, store) = store();
        let mut group = store.consumer("g").unwrap();
        assert!(group.subscribe("orders").unwrap());
        assert!(!group.subscribe("orders").unwrap());
        assert!(group.subscribe("a/b").is_err());
    }
}
