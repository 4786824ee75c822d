//! # logbus
//!
//! **logbus** is an in-process async event bus with a durable, file-backed
//! partitioned log and consumer groups.
//!
//! Two independent halves:
//! - the [`EventBus`] routes events to subscribers through a queue and a
//!   background worker, and records every event in an append-only log that
//!   can be replayed;
//! - the [`LogStore`] persists topic records to segment files, which named
//!   [`ConsumerGroup`]s read at their own pace through persisted byte offsets.
//!
//! ## Architecture
//! ### Event bus
//! ```text
//!   producer                     producer
//!      │ emit(topic, payload)       │ emit(...)
//!      ▼                            ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  EventBus                                                     │
//! │  - SubscriptionIndex (exact topics + `prefix.*` wildcards)    │
//! │  - EventLog (JSON lines file + in-memory history)             │
//! │  - DispatchQueue (FIFO of DispatchTask{topic, payload, subs}) │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 ▼
//!                     ┌────────────────────────┐
//!                     │     DispatchWorker     │
//!                     │ (one consumer, FIFO)   │
//!                     └───┬────────┬────────┬──┘
//!                         ▼        ▼        ▼
//!                     sub1.on   sub2.on   subN.on      (Err / panic isolated)
//!                     _event()  _event()  _event()
//! ```
//!
//! ### Log store
//! ```text
//! Producer::send(topic, msg) ──► <log_dir>/<topic>.log            (append)
//!
//! ConsumerGroup(group).poll()
//!   ├─► read <log_dir>/<topic>.log from offset      (complete lines only)
//!   └─► write <offset_dir>/<group>/<topic>.offset   (tmp + rename)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Subscribers**   | Async callbacks with stable identity.                        | [`Subscribe`], [`Subscriber`]               |
//! | **Routing**       | Exact and first-segment wildcard subscriptions.              | [`SubscriptionIndex`], [`TopicPattern`]     |
//! | **Dispatch**      | FIFO queue, fault-isolated worker, cooperative shutdown.     | [`EventBus`], [`WorkerHandle`]              |
//! | **Event log**     | Append-only record of every emit, replayable.                | [`EventLog`], [`ReplayReport`]              |
//! | **Log store**     | Per-topic segments, consumer groups, at-least-once offsets.  | [`LogStore`], [`ConsumerGroup`]             |
//! | **Errors**        | Typed errors with stable log labels.                         | [`BusError`], [`StoreError`]                |
//! | **Configuration** | Plain structs with defaults and env overrides.               | [`BusConfig`], [`StoreConfig`]              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use logbus::{BusConfig, EventBus, Subscriber, SubscriberError};
//! use serde_json::{json, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::builder(BusConfig::in_memory()).build();
//!
//!     let email = Subscriber::from_fn("email", |topic: String, payload: Value| async move {
//!         println!("email about {topic}: {payload}");
//!         Ok::<_, SubscriberError>(())
//!     });
//!     bus.subscribe("order.*", email);
//!
//!     let worker = bus.spawn_worker();
//!     bus.emit("order.created", json!({"order_id": 1, "amount": 100}));
//!
//!     let report = worker.shutdown().await;
//!     assert_eq!(report.delivered, 1);
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{
    BusConfig, DispatchQueue, DispatchTask, DispatchWorker, EmitOutcome, EventBus,
    EventBusBuilder, ReplayReport, WorkerHandle, WorkerReport, WorkerState,
};
pub use error::{BusError, QueueError, StoreError, SubscriberError};
pub use events::{EventLog, EventRecord, MalformedRecord, ReplayEntry};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use store::{
    Batch, ConsumerGroup, LogStore, OffsetStore, PolledRecord, Producer, StoreConfig, TOPIC_TAG,
};
pub use subscribers::{Subscribe, Subscriber, SubscriberFn, SubscriberId, SubscriptionIndex, TopicPattern};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
