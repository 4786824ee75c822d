//! # Log store configuration.
//!
//! ## Environment overrides
//! [`StoreConfig::from_env`] starts from the defaults and applies:
//! - `LOGBUS_LOG_DIR`: directory holding `<topic>.log` segments
//! - `LOGBUS_OFFSET_DIR`: directory holding `<group>/<topic>.offset` files
//!
//! Empty values are ignored.

use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "kafka_logs";
const DEFAULT_OFFSET_DIR: &str = "kafka_offsets";

/// Where the partitioned log store keeps its files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Segment directory.
    pub log_dir: PathBuf,
    /// Consumer group offset directory.
    pub offset_dir: PathBuf,
}

impl StoreConfig {
    /// Both directories under `root`, with the default names.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            log_dir: root.join(DEFAULT_LOG_DIR),
            offset_dir: root.join(DEFAULT_OFFSET_DIR),
        }
    }

    /// Defaults overridden by `LOGBUS_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = non_empty_var("LOGBUS_LOG_DIR") {
            cfg.log_dir = dir;
        }
        if let Some(dir) = non_empty_var("LOGBUS_OFFSET_DIR") {
            cfg.offset_dir = dir;
        }
        cfg
    }
}

fn non_empty_var(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl Default for StoreConfig {
    /// `kafka_logs` and `kafka_offsets`, relative to the working directory.
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            offset_dir: PathBuf::from(DEFAULT_OFFSET_DIR),
        }
    }
}
