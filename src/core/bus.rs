//! # EventBus: subscriptions, event log, and dispatch in one producer-facing object.
//!
//! The [`EventBus`] owns a [`SubscriptionIndex`], an [`EventLog`] and a
//! [`DispatchQueue`]. Producers call [`emit`](EventBus::emit) synchronously;
//! a [`DispatchWorker`] spawned with [`spawn_worker`](EventBus::spawn_worker)
//! runs the subscribers in the background.
//!
//! ## High-level architecture
//! ```text
//! emit(topic, payload)
//!   ├─► EventLog::append()          (failure: warn, keep going)
//!   ├─► SubscriptionIndex::resolve() = [s1, s2, ...]
//!   │       └─ empty ─► return (recorded, nothing queued)
//!   └─► DispatchQueue::put(Task{topic, payload, [s1, s2, ...]})
//!                          │
//!                          ▼
//!                  DispatchWorker ──► s1.on_event() ──► s2.on_event() ...
//!
//! replay(reader)
//!   for each line:
//!     ├─ malformed ─► ReplayReport.malformed (skip)
//!     └─ ok        ─► resolve against the *current* index ─► put(Task)
//!                    (never appended to the EventLog again)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use logbus::{BusConfig, EventBus, Subscriber, SubscriberError};
//! use serde_json::{json, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::new(BusConfig::in_memory());
//!     let worker = bus.spawn_worker();
//!
//!     let seen = Arc::new(AtomicUsize::new(0));
//!     let counter = {
//!         let seen = Arc::clone(&seen);
//!         Subscriber::from_fn("counter", move |_topic: String, _payload: Value| {
//!             let seen = Arc::clone(&seen);
//!             async move {
//!                 seen.fetch_add(1, Ordering::SeqCst);
//!                 Ok::<_, SubscriberError>(())
//!             }
//!         })
//!     };
//!     bus.subscribe("order.*", counter);
//!
//!     bus.emit("order.created", json!({"order_id": 1}));
//!     bus.emit("user.created", json!({"user_id": 7})); // recorded, not dispatched
//!
//!     worker.shutdown().await;
//!     assert_eq!(seen.load(Ordering::SeqCst), 1);
//!     assert_eq!(bus.history().len(), 2);
//! }
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::BusConfig;
use crate::core::queue::{Dispatch, DispatchQueue, DispatchTask};
use crate::core::worker::{DispatchWorker, WorkerHandle, WorkerState};
use crate::error::BusError;
use crate::events::{EventLog, EventRecord, MalformedRecord, ReplayEntry};
use crate::subscribers::{Subscriber, SubscriptionIndex};

/// What one [`EventBus::emit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOutcome {
    /// Subscribers resolved for the topic.
    pub subscribers: usize,
    /// Whether a dispatch task was enqueued.
    pub queued: bool,
    /// Whether the event log file append succeeded (always `true` without a file).
    pub logged: bool,
}

/// Summary of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records that produced a dispatch task.
    pub replayed: usize,
    /// Well-formed records with no current subscriber.
    pub ignored: usize,
    /// Lines that could not be parsed.
    pub malformed: Vec<MalformedRecord>,
    /// Read error that cut the pass short, if any.
    pub read_error: Option<String>,
}

/// In-process event bus.
pub struct EventBus {
    cfg: BusConfig,
    index: RwLock<SubscriptionIndex>,
    log: EventLog,
    queue: Arc<DispatchQueue>,
    worker_state: Arc<AtomicU8>,
}

impl EventBus {
    /// Creates a bus whose event log follows `cfg.event_log`.
    pub fn new(cfg: BusConfig) -> Self {
        let log = EventLog::with_path(cfg.event_log.clone());
        Self::with_parts(cfg, log, SubscriptionIndex::new())
    }

    /// Starts a [`EventBusBuilder`](crate::core::EventBusBuilder).
    pub fn builder(cfg: BusConfig) -> crate::core::EventBusBuilder {
        crate::core::EventBusBuilder::new(cfg)
    }

    pub(crate) fn with_parts(cfg: BusConfig, log: EventLog, index: SubscriptionIndex) -> Self {
        Self {
            cfg,
            index: RwLock::new(index),
            log,
            queue: Arc::new(DispatchQueue::new()),
            worker_state: Arc::new(AtomicU8::new(WorkerState::Stopped as u8)),
        }
    }

    /// Configuration this bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.cfg
    }

    /// The dispatch queue (for drain inspection).
    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }

    /// Spawns a dispatch worker for this bus on the current tokio runtime.
    ///
    /// Run one worker per bus at a time; after [`WorkerHandle::shutdown`]
    /// completes a new one may be spawned and picks up anything queued since.
    pub fn spawn_worker(&self) -> WorkerHandle {
        DispatchWorker::spawn_tracked(
            Arc::clone(&self.queue),
            &self.cfg,
            Arc::clone(&self.worker_state),
        )
    }

    /// State of the most recently spawned worker; `Stopped` before the first spawn.
    pub fn worker_state(&self) -> WorkerState {
        WorkerState::from_u8(self.worker_state.load(AtomicOrdering::Acquire))
    }

    /// Registers `subscriber` on a topic or `prefix.*` pattern.
    ///
    /// Returns `false` (and changes nothing) if that handle is already registered on `topic`.
    pub fn subscribe(&self, topic: &str, subscriber: Subscriber) -> bool {
        let name = subscriber.name().to_owned();
        let id = subscriber.id();
        let added = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic, subscriber);
        if added {
            info!(topic, subscriber = %name, %id, "subscribed");
        } else {
            debug!(topic, subscriber = %name, %id, "already subscribed");
        }
        added
    }

    /// Removes `subscriber` from `topic`.
    ///
    /// Not being subscribed is reported as [`BusError::NotSubscribed`] and logged; it never panics.
    pub fn unsubscribe(&self, topic: &str, subscriber: &Subscriber) -> Result<(), BusError> {
        let removed = self
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic, subscriber);
        if removed {
            info!(topic, subscriber = subscriber.name(), id = %subscriber.id(), "unsubscribed");
            return Ok(());
        }
        let err = BusError::NotSubscribed {
            topic: topic.to_owned(),
            subscriber: subscriber.name().to_owned(),
            id: subscriber.id(),
        };
        warn!(error = %err, label = err.as_label(), "unsubscribe failed");
        Err(err)
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("all subscriptions cleared");
    }

    /// Registered keys (exact topics, then `prefix.*` patterns).
    pub fn subscriptions(&self) -> Vec<String> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
    }

    /// Subscribers `topic` would be dispatched to right now.
    pub fn resolve(&self, topic: &str) -> Vec<Subscriber> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(topic)
    }

    /// Records the event, then queues it for every resolved subscriber.
    ///
    /// Returns without waiting for dispatch. A log failure is logged and does
    /// not prevent dispatch; no subscribers means recorded but not queued.
    pub fn emit(&self, topic: &str, payload: Value) -> EmitOutcome {
        let (_, logged) = self.log.append(topic, &payload);
        let logged = match logged {
            Ok(()) => true,
            Err(e) => {
                warn!(topic, error = %e, label = e.as_label(), "event log append failed");
                false
            }
        };

        let subscribers = self.resolve(topic);
        let count = subscribers.len();
        if subscribers.is_empty() {
            debug!(topic, "no subscribers; event recorded only");
            return EmitOutcome {
                subscribers: 0,
                queued: false,
                logged,
            };
        }

        let queued = self.enqueue(topic, Arc::new(payload), subscribers);
        EmitOutcome {
            subscribers: count,
            queued,
            logged,
        }
    }

    fn enqueue(&self, topic: &str, payload: Arc<Value>, subscribers: Vec<Subscriber>) -> bool {
        let count = subscribers.len();
        let task = DispatchTask {
            topic: topic.into(),
            payload,
            subscribers,
        };
        match self.queue.put(Dispatch::Task(task)) {
            Ok(()) => {
                debug!(topic, subscribers = count, "task queued");
                true
            }
            Err(_) => {
                let err = BusError::Enqueue {
                    topic: topic.to_owned(),
                };
                warn!(error = %err, label = err.as_label(), "dispatch dropped");
                false
            }
        }
    }

    /// Re-dispatches records read from `reader` against the current subscriptions.
    ///
    /// Replayed records are never appended to the event log again.
    pub fn replay<R: BufRead>(&self, mut reader: R) -> ReplayReport {
        let mut report = ReplayReport::default();
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "replay read failed; stopping");
                    report.read_error = Some(e.to_string());
                    break;
                }
            }
            line_no += 1;

            let entry = match ReplayEntry::parse(line_no, &buf) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(bad) => {
                    warn!(line = bad.line, reason = %bad.reason, "skipping malformed log record");
                    report.malformed.push(bad);
                    continue;
                }
            };

            let subscribers = self.resolve(&entry.event);
            if subscribers.is_empty() {
                debug!(topic = %entry.event, "replay: no current subscribers");
                report.ignored += 1;
                continue;
            }
            if self.enqueue(&entry.event, Arc::new(entry.data), subscribers) {
                report.replayed += 1;
            }
        }

        info!(
            replayed = report.replayed,
            ignored = report.ignored,
            malformed = report.malformed.len(),
            "replay finished"
        );
        report
    }

    /// [`replay`](Self::replay) from a file.
    pub fn replay_file(&self, path: impl AsRef<Path>) -> Result<ReplayReport, BusError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BusError::ReplaySource {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "replay started");
        Ok(self.replay(BufReader::new(file)))
    }

    /// Records emitted through this bus, oldest first.
    pub fn history(&self) -> Vec<EventRecord> {
        self.log.history()
    }

    /// The underlying event log.
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubscriberError;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn fast_cfg(event_log: Option<std::path::PathBuf>) -> BusConfig {
        BusConfig {
            event_log,
            recv_timeout: Duration::from_millis(20),
            ..BusConfig::default()
        }
    }

    fn recorder(name: &'static str, calls: &Calls) -> Subscriber {
        let calls = Arc::clone(calls);
        Subscriber::from_fn(name, move |topic: String, _payload: Value| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().unwrap().push(format!("{name}:{topic}"));
                Ok::<_, SubscriberError>(())
            }
        })
    }

    fn failing(name: &'static str) -> Subscriber {
        Subscriber::from_fn(name, |topic: String, _payload: Value| async move {
            Err::<(), _>(SubscriberError::fail(format!("cannot handle {topic}")))
        })
    }

    #[tokio::test]
    async fn exact_and_wildcard_each_run_once() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        let both = recorder("both", &calls);

        bus.subscribe("user.created", both.clone());
        bus.subscribe("user.*", both.clone());
        bus.subscribe("user.*", both.clone());

        let worker = bus.spawn_worker();
        let out = bus.emit("user.created", json!({"user_id": 1}));
        assert_eq!(out.subscribers, 1);
        let report = worker.shutdown().await;

        assert_eq!(*calls.lock().unwrap(), vec!["both:user.created"]);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn fifo_across_tasks() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        bus.subscribe("a.x", recorder("first", &calls));
        bus.subscribe("a.x", recorder("second", &calls));
        bus.subscribe("b.y", recorder("third", &calls));

        bus.emit("a.x", json!(1));
        bus.emit("b.y", json!(2));
        let worker = bus.spawn_worker();
        worker.shutdown().await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first:a.x", "second:a.x", "third:b.y"]
        );
    }

    #[tokio::test]
    async fn failing_subscriber_is_isolated() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        bus.subscribe("order.created", failing("email"));
        bus.subscribe("order.created", recorder("analytics", &calls));

        let worker = bus.spawn_worker();
        bus.emit("order.created", json!({"order_id": 2}));
        let report = worker.shutdown().await;

        assert_eq!(*calls.lock().unwrap(), vec!["analytics:order.created"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn panicking_subscriber_is_isolated() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        bus.subscribe(
            "order.paid",
            Subscriber::from_fn("boom", |_t: String, _p: Value| async move {
                panic!("subscriber exploded");
                Ok::<_, SubscriberError>(())
            }),
        );
        bus.subscribe("order.paid", recorder("sms", &calls));

        let worker = bus.spawn_worker();
        bus.emit("order.paid", json!({}));
        bus.emit("order.paid", json!({}));
        let report = worker.shutdown().await;

        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.tasks, 2);
    }

    #[tokio::test]
    async fn no_subscribers_records_without_queueing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let bus = EventBus::new(fast_cfg(Some(path.clone())));

        let out = bus.emit("user.deleted", json!({"user_id": 3}));
        assert_eq!(
            out,
            EmitOutcome {
                subscribers: 0,
                queued: false,
                logged: true
            }
        );
        assert_eq!(bus.queue().pending(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
        assert_eq!(bus.history()[0].event, "user.deleted");
    }

    #[tokio::test]
    async fn log_failure_does_not_block_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new(fast_cfg(Some(dir.path().to_path_buf())));
        let calls: Calls = Arc::default();
        bus.subscribe("order.created", recorder("email", &calls));

        let worker = bus.spawn_worker();
        let out = bus.emit("order.created", json!({}));
        worker.shutdown().await;

        assert!(!out.logged);
        assert!(out.queued);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_added_later_do_not_join_queued_task() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        bus.subscribe("order.created", recorder("early", &calls));
        bus.emit("order.created", json!({}));
        bus.subscribe("order.created", recorder("late", &calls));

        bus.spawn_worker().shutdown().await;
        assert_eq!(*calls.lock().unwrap(), vec!["early:order.created"]);
    }

    #[tokio::test]
    async fn unsubscribe_reports_missing() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        let logger = recorder("logger", &calls);

        bus.subscribe("user.*", logger.clone());
        assert!(bus.unsubscribe("user.*", &logger).is_ok());
        let err = bus.unsubscribe("user.*", &logger).unwrap_err();
        assert_eq!(err.as_label(), "bus_not_subscribed");
        assert!(bus.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn replay_uses_current_subscriptions_and_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");
        let bus = EventBus::new(fast_cfg(Some(path.clone())));
        bus.emit("order.created", json!({"order_id": 1}));
        bus.emit("order.paid", json!({"order_id": 1}));
        bus.emit("user.created", json!({"user_id": 9}));
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"{broken\n"))
            .unwrap();

        let calls: Calls = Arc::default();
        bus.subscribe("order.*", recorder("replayer", &calls));

        let worker = bus.spawn_worker();
        let report = bus.replay_file(&path).unwrap();
        worker.shutdown().await;

        assert_eq!(report.replayed, 2);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.malformed[0].line, 4);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["replayer:order.created", "replayer:order.paid"]
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 4);
        assert_eq!(bus.history().len(), 3);
    }

    #[tokio::test]
    async fn replay_missing_file_is_an_error() {
        let bus = EventBus::new(fast_cfg(None));
        let err = bus.replay_file("/definitely/not/here.log").unwrap_err();
        assert_eq!(err.as_label(), "bus_replay_source");
    }

    #[tokio::test]
    async fn worker_can_restart_after_shutdown() {
        let bus = EventBus::new(fast_cfg(None));
        let calls: Calls = Arc::default();
        bus.subscribe("a.b", recorder("r", &calls));

        let first = bus.spawn_worker();
        bus.emit("a.b", json!(1));
        first.shutdown().await;

        bus.emit("a.b", json!(2));
        assert_eq!(bus.worker_state(), WorkerState::Stopped);
        assert_eq!(bus.queue().pending(), 1);
        let second = bus.spawn_worker();
        let report = second.shutdown().await;

        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(report.tasks, 1);
        assert_eq!(bus.queue().pending(), 0);
    }
}
