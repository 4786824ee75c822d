//! # Event subscribers and the subscription index.
//!
//! This module provides the [`Subscribe`] trait, the identity-carrying
//! [`Subscriber`] handle and the [`SubscriptionIndex`] that maps topics and
//! `prefix.*` patterns to ordered subscriber lists.
//!
//! ## Architecture
//! ```text
//! EventBus::subscribe(key, Subscriber) ──► SubscriptionIndex
//!                                              ├── exact["order.created"] = [email, analytics]
//!                                              └── wildcard["order"]      = [audit]
//!
//! EventBus::emit("order.created") ──► resolve() = [email, analytics, audit]
//!                                         └──► DispatchTask ──► worker ──► Subscribe::on_event()
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use logbus::{Subscribe, Subscriber, SubscriberError};
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     async fn on_event(&self, topic: &str, _payload: &Value) -> Result<(), SubscriberError> {
//!         if topic.ends_with(".failed") {
//!             // increment failure counter
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let handle = Subscriber::new(Metrics);
//! ```

mod index;
#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber;

pub use index::{SubscriptionIndex, TopicPattern};
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber::{Subscriber, SubscriberFn, SubscriberId};
