//! # Partitioned log store and its producer.
//!
//! One append-only segment file per topic:
//!
//! ```text
//! <log_dir>/
//!   orders.log      {"order_id":1,"amount":100}\n{"order_id":2,...}\n
//!   payments.log    {"payment_id":"p1",...}\n
//! ```
//!
//! ## Rules
//! - Records are compact JSON, one per line; a record never contains a raw newline.
//! - Appends through clones of one [`LogStore`] are serialized by an in-process lock.
//! - No fsync: a crash can leave a torn last line, which readers leave unconsumed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{ConsumerGroup, StoreConfig};

/// A topic or group name that maps onto exactly one file or directory name.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

pub(crate) fn check_topic(topic: &str) -> Result<(), StoreError> {
    if is_valid_name(topic) {
        Ok(())
    } else {
        Err(StoreError::InvalidTopic(topic.to_owned()))
    }
}

struct StoreInner {
    cfg: StoreConfig,
    write_lock: Mutex<()>,
}

/// Handle to the on-disk store; clones share the write lock.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("log_dir", &self.inner.cfg.log_dir)
            .field("offset_dir", &self.inner.cfg.offset_dir)
            .finish()
    }
}

impl LogStore {
    /// Creates both directories (if missing) and returns a handle.
    pub fn open(cfg: StoreConfig) -> Result<Self, StoreError> {
        for dir in [&cfg.log_dir, &cfg.offset_dir] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        debug!(log_dir = %cfg.log_dir.display(), offset_dir = %cfg.offset_dir.display(), "log store opened");
        Ok(Self {
            inner: Arc::new(StoreInner {
                cfg,
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.cfg
    }

    /// A producer writing into this store.
    pub fn producer(&self) -> Producer {
        Producer {
            store: self.clone(),
        }
    }

    /// A consumer group over this store, with its persisted offsets loaded.
    pub fn consumer(&self, group_id: &str) -> Result<ConsumerGroup, StoreError> {
        ConsumerGroup::open(self.clone(), group_id)
    }

    /// Segment file of `topic`.
    pub fn segment_path(&self, topic: &str) -> Result<PathBuf, StoreError> {
        check_topic(topic)?;
        Ok(self.inner.cfg.log_dir.join(format!("{topic}.log")))
    }

    /// Current byte length of the segment; `0` if it does not exist yet.
    pub fn segment_len(&self, topic: &str) -> Result<u64, StoreError> {
        let path = self.segment_path(topic)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Topics that have a segment, sorted.
    pub fn topics(&self) -> Result<Vec<String>, StoreError> {
        let dir = &self.inner.cfg.log_dir;
        let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
        let mut topics = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let name = entry.file_name();
            if let Some(topic) = name.to_str().and_then(|n| n.strip_suffix(".log")) {
                if is_valid_name(topic) {
                    topics.push(topic.to_owned());
                }
            }
        }
        topics.sort();
        Ok(topics)
    }

    fn append(&self, path: &Path, line: &[u8]) -> Result<(), StoreError> {
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.write_all(line).map_err(|e| StoreError::io(path, e))
    }
}

/// Appends records to topic segments.
#[derive(Clone, Debug)]
pub struct Producer {
    store: LogStore,
}

impl Producer {
    /// Serializes `message` as one JSON line and appends it to `topic`.
    ///
    /// Returns the number of bytes appended (newline included), which is
    /// exactly how far a consumer's offset moves past this record.
    pub fn send<T>(&self, topic: &str, message: &T) -> Result<u64, StoreError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.store.segment_path(topic)?;
        let mut line = serde_json::to_vec(message).map_err(|source| StoreError::Serialize {
            topic: topic.to_owned(),
            source,
        })?;
        line.push(b'\n');

        self.store.append(&path, &line)?;
        debug!(topic, bytes = line.len(), "record appended");
        Ok(line.len() as u64)
    }
}
