//! # LogWriter: simple event printer
//!
//! A minimal subscriber that records every dispatched event through `tracing`.
//! Use it for tests or demos, typically on a wildcard key.
//!
//! ## Example output
//! ```text
//! INFO logbus::subscribers::log: event dispatched topic="order.created" payload={"order_id":1}
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SubscriberError;
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, topic: &str, payload: &Value) -> Result<(), SubscriberError> {
        tracing::info!(topic, %payload, "event dispatched");
        Ok(())
    }

    fn name(&self) -> &str {
        "LogWriter"
    }
}
