//! Runtime core: the event bus and its dispatch machinery.
//!
//! The public entry point is [`EventBus`]; everything else here supports it.
//!
//! Internal modules:
//! - [`bus`]: subscriptions, event log and enqueueing behind one object;
//! - [`builder`]: [`EventBusBuilder`] for pre-registered subscriptions;
//! - [`config`]: [`BusConfig`] and its environment overrides;
//! - [`queue`]: FIFO of dispatch tasks with drain accounting;
//! - [`worker`]: the background consumer with fault isolation.

mod builder;
mod bus;
mod config;
mod queue;
mod worker;

pub use builder::EventBusBuilder;
pub use bus::{EmitOutcome, EventBus, ReplayReport};
pub use config::BusConfig;
pub use queue::{DispatchQueue, DispatchTask};
pub use worker::{DispatchWorker, WorkerHandle, WorkerReport, WorkerState};
