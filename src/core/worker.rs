//! # DispatchWorker: the single consumer of a bus's queue.
//!
//! Drains [`DispatchQueue`] and invokes every subscriber of every task, in
//! order, with per-subscriber fault isolation.
//!
//! ## Lifecycle
//! ```text
//! EventBus::spawn_worker() ──► Running
//!
//! loop {
//!   ├─► queue.receiver()          ─ Err(Contended/Closed) ─► warn, sleep(backoff.next(n)), retry
//!   ├─► recv_timeout(recv_timeout)
//!   │       ├─ None (wait expired) ─► loop (not an error)
//!   │       ├─ Stop                ─► task_done(), exit
//!   │       └─ Task                ─► for sub in task.subscribers:
//!   │                                    sub.on_event(topic, payload)
//!   │                                      ├─ Ok       ─► delivered += 1
//!   │                                      ├─ Err(e)   ─► warn{subscriber, topic}, failed += 1
//!   │                                      └─ panic    ─► error{subscriber, topic}, failed += 1
//!   │                                 task_done()
//! }
//!
//! WorkerHandle::shutdown():
//!   Running ─► Draining ─► put(Stop) ─► await loop exit ─► queue.join() ─► Stopped
//! ```
//!
//! ## Rules
//! - Tasks run in strict FIFO order; subscribers of one task run sequentially.
//! - A failing subscriber never aborts the rest of its task nor the loop.
//! - Shutdown is cooperative: a subscriber already running is never interrupted,
//!   and every task enqueued before `Stop` still runs.
//!
//! **Warning**: panics are caught with `AssertUnwindSafe`; a subscriber that
//! panics while holding a lock on shared state can leave that state inconsistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::BusConfig;
use crate::core::queue::{Dispatch, DispatchQueue, DispatchTask};
use crate::policies::BackoffPolicy;

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Consuming tasks.
    Running = 0,
    /// Stop sentinel enqueued; earlier tasks are still being processed.
    Draining = 1,
    /// Loop exited and the queue reported full drain.
    Stopped = 2,
}

impl WorkerState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Running,
            1 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

/// Counters collected over a worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Dispatch tasks processed.
    pub tasks: u64,
    /// Subscriber invocations that returned `Ok`.
    pub delivered: u64,
    /// Subscriber invocations that returned `Err` or panicked.
    pub failed: u64,
}

/// Consumer loop over one dispatch queue.
pub struct DispatchWorker {
    queue: Arc<DispatchQueue>,
    recv_timeout: Duration,
    backoff: BackoffPolicy,
}

impl DispatchWorker {
    /// Spawns the consumer loop on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(queue: Arc<DispatchQueue>, cfg: &BusConfig) -> WorkerHandle {
        Self::spawn_tracked(queue, cfg, Arc::new(AtomicU8::new(WorkerState::Running as u8)))
    }

    /// Like [`spawn`](Self::spawn), publishing lifecycle changes into `state`.
    pub(crate) fn spawn_tracked(
        queue: Arc<DispatchQueue>,
        cfg: &BusConfig,
        state: Arc<AtomicU8>,
    ) -> WorkerHandle {
        state.store(WorkerState::Running as u8, AtomicOrdering::Release);
        let worker = DispatchWorker {
            queue: Arc::clone(&queue),
            recv_timeout: cfg.recv_timeout_clamped(),
            backoff: cfg.backoff,
        };
        let join = tokio::spawn(worker.run());
        info!("dispatch worker started");
        WorkerHandle { queue, state, join }
    }

    async fn run(self) -> WorkerReport {
        let mut report = WorkerReport::default();
        let mut failures: u32 = 0;

        loop {
            let mut rx = match self.queue.receiver() {
                Ok(rx) => rx,
                Err(e) => {
                    self.back_off(&mut failures, e.as_label()).await;
                    continue;
                }
            };

            match rx.recv_timeout(self.recv_timeout).await {
                Ok(None) => {
                    failures = 0;
                }
                Ok(Some(Dispatch::Stop)) => {
                    self.queue.task_done();
                    break;
                }
                Ok(Some(Dispatch::Task(task))) => {
                    failures = 0;
                    self.dispatch(&task, &mut report).await;
                    self.queue.task_done();
                }
                Err(e) => {
                    drop(rx);
                    self.back_off(&mut failures, e.as_label()).await;
                }
            }
        }

        info!(
            tasks = report.tasks,
            delivered = report.delivered,
            failed = report.failed,
            "dispatch worker stopped"
        );
        report
    }

    async fn back_off(&self, failures: &mut u32, label: &'static str) {
        let delay = self.backoff.next(*failures);
        *failures = failures.saturating_add(1);
        warn!(error = label, retry_in = ?delay, attempt = *failures, "dispatch queue unavailable");
        tokio::time::sleep(delay).await;
    }

    async fn dispatch(&self, task: &DispatchTask, report: &mut WorkerReport) {
        report.tasks += 1;
        debug!(topic = %task.topic, subscribers = task.subscribers.len(), "dispatching");

        for sub in &task.subscribers {
            let fut = sub.call(&task.topic, &task.payload);
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(
                        subscriber = sub.name(),
                        id = %sub.id(),
                        topic = %task.topic,
                        error = %e,
                        "subscriber failed"
                    );
                }
                Err(panic_err) => {
                    report.failed += 1;
                    let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                        (*msg).to_string()
                    } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                        msg.clone()
                    } else {
                        "unknown panic".to_string()
                    };
                    error!(
                        subscriber = sub.name(),
                        id = %sub.id(),
                        topic = %task.topic,
                        panic = %info,
                        "subscriber panicked"
                    );
                }
            }
        }
    }
}

/// Handle to a running [`DispatchWorker`].
///
/// Dropping the handle detaches the worker; it keeps consuming until a `Stop`
/// sentinel reaches it. The state is shared with the owning
/// [`EventBus`](crate::EventBus), so [`EventBus::worker_state`](crate::EventBus::worker_state)
/// observes `Draining` while [`shutdown`](Self::shutdown) is in progress.
pub struct WorkerHandle {
    queue: Arc<DispatchQueue>,
    state: Arc<AtomicU8>,
    join: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Current state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(AtomicOrdering::Acquire))
    }

    /// True once the consumer loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cooperative shutdown.
    ///
    /// 1. Marks the worker `Draining` and enqueues the `Stop` sentinel
    /// 2. Awaits loop termination (every earlier task runs first)
    /// 3. Awaits the queue's full-drain report
    ///
    /// # Hangs
    /// Step 3 waits until nothing is pending. Stop producers before calling
    /// this: an item emitted after the sentinel stays pending until another
    /// worker runs. Likewise, if a second worker on the same queue dequeues the
    /// sentinel, this loop keeps running and step 2 does not return.
    pub async fn shutdown(self) -> WorkerReport {
        self.state
            .store(WorkerState::Draining as u8, AtomicOrdering::Release);
        if self.queue.put(Dispatch::Stop).is_err() {
            warn!("dispatch queue closed before stop sentinel");
        }

        let report = match self.join.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "dispatch worker aborted");
                self.state
                    .store(WorkerState::Stopped as u8, AtomicOrdering::Release);
                return WorkerReport::default();
            }
        };

        self.queue.join().await;
        self.state
            .store(WorkerState::Stopped as u8, AtomicOrdering::Release);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventBus;
    use crate::error::SubscriberError;
    use crate::subscribers::Subscriber;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn fast_cfg() -> BusConfig {
        BusConfig {
            recv_timeout: Duration::from_millis(10),
            backoff: BackoffPolicy::constant(Duration::from_millis(10)),
            ..BusConfig::in_memory()
        }
    }

    async fn wait_for(bus: &EventBus, want: WorkerState) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while bus.worker_state() != want {
            assert!(tokio::time::Instant::now() < deadline, "never reached {want:?}");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn state_moves_through_draining_to_stopped() {
        let bus = EventBus::new(fast_cfg());
        assert_eq!(bus.worker_state(), WorkerState::Stopped);

        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let slow = {
            let (started, release) = (Arc::clone(&started), Arc::clone(&release));
            Subscriber::from_fn("slow", move |_t: String, _p: Value| {
                let (started, release) = (Arc::clone(&started), Arc::clone(&release));
                async move {
                    started.notify_one();
                    release.notified().await;
                    Ok::<_, SubscriberError>(())
                }
            })
        };
        bus.subscribe("order.created", slow);

        let worker = bus.spawn_worker();
        assert_eq!(worker.state(), WorkerState::Running);
        assert_eq!(bus.worker_state(), WorkerState::Running);

        bus.emit("order.created", json!({}));
        started.notified().await;

        let stopping = tokio::spawn(worker.shutdown());
        wait_for(&bus, WorkerState::Draining).await;
        assert!(!stopping.is_finished());

        release.notify_one();
        let report = stopping.await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(bus.worker_state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn contended_queue_backs_off_and_recovers() {
        let bus = EventBus::new(fast_cfg());
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorder = {
            let calls = Arc::clone(&calls);
            Subscriber::from_fn("recorder", move |topic: String, _p: Value| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.lock().unwrap().push(topic);
                    Ok::<_, SubscriberError>(())
                }
            })
        };
        bus.subscribe("order.paid", recorder);

        let held = bus.queue().receiver().unwrap();
        let worker = bus.spawn_worker();
        bus.emit("order.paid", json!({"order_id": 1}));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!worker.is_finished());
        assert_eq!(worker.state(), WorkerState::Running);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(bus.queue().pending(), 1);

        drop(held);
        let report = tokio::time::timeout(Duration::from_secs(2), worker.shutdown())
            .await
            .expect("shutdown completes once the receiver is free");

        assert_eq!(report.tasks, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["order.paid"]);
        assert_eq!(bus.queue().pending(), 0);
    }
}
