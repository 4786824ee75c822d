//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging event handlers into the bus.
//! Implementations are driven by the single dispatch worker, one task at a
//! time, in resolution order.
//!
//! ## Contract
//! - A handler receives the topic it was dispatched for (the concrete topic,
//!   also when it was reached through a wildcard) and the payload.
//! - Returning `Err` or panicking is isolated: the worker logs it with the
//!   handler's name and the topic and moves on to the next handler.
//! - Handlers run sequentially on the worker; a slow handler delays every
//!   later task on the same bus.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use logbus::{Subscribe, SubscriberError};
//! use serde_json::Value;
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, topic: &str, payload: &Value) -> Result<(), SubscriberError> {
//!         let _ = (topic, payload); // write audit record...
//!         Ok(())
//!     }
//!     fn name(&self) -> &str { "audit" }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SubscriberError;

/// Contract for event handlers.
///
/// Called from the dispatch worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single dispatched event.
    async fn on_event(&self, topic: &str, payload: &Value) -> Result<(), SubscriberError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
