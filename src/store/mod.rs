//! Durable, file-backed log store with consumer groups.
//!
//! Independent of the [`EventBus`](crate::EventBus): producers append JSON
//! records to per-topic segment files, and each [`ConsumerGroup`] reads them at
//! its own pace through a persisted byte offset.
//!
//! ```text
//! Producer::send("orders", msg) ──► kafka_logs/orders.log   (append one line)
//!
//! ConsumerGroup("billing").poll()
//!   ├─► read kafka_logs/orders.log from offset
//!   └─► write kafka_offsets/billing/orders.offset (tmp + rename)
//! ```
//!
//! ## Example
//! ```rust
//! use logbus::{LogStore, StoreConfig};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = LogStore::open(StoreConfig::under(dir.path())).unwrap();
//! store.producer().send("orders", &json!({"order_id": 1})).unwrap();
//!
//! let mut billing = store.consumer("billing").unwrap();
//! billing.subscribe("orders").unwrap();
//! let records = billing.poll(None);
//! assert_eq!(records[0].tagged()["__topic__"], "orders");
//! assert!(billing.poll(None).is_empty());
//! ```

mod config;
mod consumer;
mod log_store;
mod offsets;

pub use config::StoreConfig;
pub use consumer::{Batch, ConsumerGroup, PolledRecord, TOPIC_TAG};
pub use log_store::{LogStore, Producer};
pub use offsets::OffsetStore;
