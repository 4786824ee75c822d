//! # Event bus configuration.
//!
//! Provides [`BusConfig`], the centralized settings for one [`EventBus`](crate::EventBus)
//! and its dispatch worker.
//!
//! ## Sentinel values
//! - `event_log = None` → in-memory history only, nothing written to disk
//! - `recv_timeout = 0s` → clamped to 1ms (the worker must never spin on a zero wait)
//!
//! ## Environment overrides
//! [`BusConfig::from_env`] starts from the defaults and applies:
//! - `LOGBUS_EVENT_LOG`: event log path; an empty value disables the file
//! - `LOGBUS_RECV_TIMEOUT_MS`: worker dequeue wait in milliseconds

use std::path::PathBuf;
use std::time::Duration;

use crate::policies::BackoffPolicy;

const DEFAULT_EVENT_LOG: &str = "events.log";
const DEFAULT_RECV_TIMEOUT_MS: u64 = 1000;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(1);

/// Configuration for the event bus runtime.
///
/// ## Field semantics
/// - `event_log`: JSON-lines file every emit is appended to (`None` = memory only)
/// - `recv_timeout`: bounded wait of one dequeue attempt; expiry is not an error
/// - `backoff`: delay schedule after transient queue-access errors
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Event log file.
    pub event_log: Option<PathBuf>,

    /// How long one dequeue attempt may block before the worker loops again.
    pub recv_timeout: Duration,

    /// Retry delay after a transient dequeue failure.
    pub backoff: BackoffPolicy,
}

impl BusConfig {
    /// Configuration without an event log file.
    pub fn in_memory() -> Self {
        Self {
            event_log: None,
            ..Self::default()
        }
    }

    /// Defaults overridden by `LOGBUS_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(path) = std::env::var("LOGBUS_EVENT_LOG") {
            cfg.event_log = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(raw) = std::env::var("LOGBUS_RECV_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => cfg.recv_timeout = Duration::from_millis(ms),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring LOGBUS_RECV_TIMEOUT_MS"),
            }
        }
        cfg
    }

    /// Dequeue wait clamped to at least 1ms.
    #[inline]
    pub fn recv_timeout_clamped(&self) -> Duration {
        self.recv_timeout.max(MIN_RECV_TIMEOUT)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `event_log = "events.log"`
    /// - `recv_timeout = 1s`
    /// - `backoff = 2s constant`
    fn default() -> Self {
        Self {
            event_log: Some(PathBuf::from(DEFAULT_EVENT_LOG)),
            recv_timeout: Duration::from_millis(DEFAULT_RECV_TIMEOUT_MS),
            backoff: BackoffPolicy::constant(Duration::from_millis(DEFAULT_RETRY_DELAY_MS)),
        }
    }
}
