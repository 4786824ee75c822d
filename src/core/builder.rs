use std::sync::Arc;

use crate::{
    core::{BusConfig, EventBus},
    events::EventLog,
    subscribers::{Subscriber, SubscriptionIndex},
};

/// Builder for an [`EventBus`] with subscriptions registered up front.
pub struct EventBusBuilder {
    cfg: BusConfig,
    log: Option<EventLog>,
    subscriptions: Vec<(String, Subscriber)>,
}

impl EventBusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            log: None,
            subscriptions: Vec::new(),
        }
    }

    /// Uses `log` instead of one derived from `cfg.event_log`.
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Registers `subscriber` on `topic` (exact or `prefix.*`) before the bus exists.
    ///
    /// Duplicate registrations collapse the same way [`EventBus::subscribe`] does.
    pub fn with_subscription(mut self, topic: impl Into<String>, subscriber: Subscriber) -> Self {
        self.subscriptions.push((topic.into(), subscriber));
        self
    }

    /// Builds the bus. No worker is started; call [`EventBus::spawn_worker`].
    pub fn build(self) -> Arc<EventBus> {
        let log = self
            .log
            .unwrap_or_else(|| EventLog::with_path(self.cfg.event_log.clone()));

        let mut index = SubscriptionIndex::new();
        for (topic, subscriber) in self.subscriptions {
            index.insert(&topic, subscriber);
        }

        Arc::new(EventBus::with_parts(self.cfg, log, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubscriberError;
    use serde_json::Value;

    #[test]
    fn builder_registers_subscriptions_and_log() {
        let sub = Subscriber::from_fn("noop", |_t: String, _p: Value| async {
            Ok::<_, SubscriberError>(())
        });
        let bus = EventBus::builder(BusConfig::default())
            .with_log(EventLog::in_memory())
            .with_subscription("order.*", sub.clone())
            .with_subscription("order.created", sub.clone())
            .with_subscription("order.created", sub)
            .build();

        assert!(bus.event_log().path().is_none());
        assert_eq!(bus.resolve("order.created").len(), 1);
        assert_eq!(bus.subscriptions().len(), 2);
    }
}
