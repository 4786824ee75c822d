//! # Persisted consumer group offsets.
//!
//! ```text
//! <offset_dir>/
//!   billing/
//!     orders.offset     "52"
//!     payments.offset   "31"
//!   shipping/
//!     orders.offset     "26"
//! ```
//!
//! ## Rules
//! - One file per (group, topic) holding a decimal byte offset.
//! - Writes go to a fresh temp file in the group directory, are synced, and
//!   are renamed over the target, so a reader sees either the old or the new
//!   value and concurrent saves never share a temp file.
//! - An unreadable or unparsable file is skipped with a warning; the topic
//!   then restarts from 0 (at-least-once).

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::StoreError;
use crate::store::log_store::{check_topic, is_valid_name};

const OFFSET_EXT: &str = ".offset";

/// Offset files of one consumer group.
#[derive(Clone, Debug)]
pub struct OffsetStore {
    group_id: String,
    dir: PathBuf,
}

impl OffsetStore {
    /// Opens (creating if needed) the offset directory of `group_id`.
    pub fn open(offset_dir: &Path, group_id: &str) -> Result<Self, StoreError> {
        if !is_valid_name(group_id) {
            return Err(StoreError::InvalidGroup(group_id.to_owned()));
        }
        let dir = offset_dir.join(group_id);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self {
            group_id: group_id.to_owned(),
            dir,
        })
    }

    /// Directory holding this group's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{topic}{OFFSET_EXT}"))
    }

    /// Persisted offset of `topic`, if any.
    pub fn load(&self, topic: &str) -> Result<Option<u64>, StoreError> {
        check_topic(topic)?;
        let path = self.path(topic);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        match raw.trim().parse::<u64>() {
            Ok(offset) => Ok(Some(offset)),
            Err(e) => {
                warn!(group = %self.group_id, topic, value = %raw.trim(), error = %e, "ignoring unparsable offset file");
                Ok(None)
            }
        }
    }

    /// Every persisted offset of the group, keyed by topic.
    pub fn load_all(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut offsets = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(topic) = name.to_str().and_then(|n| n.strip_suffix(OFFSET_EXT)) else {
                continue;
            };
            if !is_valid_name(topic) {
                continue;
            }
            match self.load(topic) {
                Ok(Some(offset)) => {
                    offsets.insert(topic.to_owned(), offset);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(group = %self.group_id, topic, error = %e, label = e.as_label(), "skipping offset file");
                }
            }
        }
        Ok(offsets)
    }

    /// Durably replaces the offset of `topic`.
    pub fn save(&self, topic: &str, offset: u64) -> Result<(), StoreError> {
        check_topic(topic)?;
        let target = self.path(topic);

        // NamedTempFile + write + sync_all + rename; each save gets its own temp file.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(offset.to_string().as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        Ok(())
    }
}
