//! # Dispatch queue between producers and the worker.
//!
//! [`DispatchQueue`] is an unbounded MPSC channel plus acknowledgement
//! accounting. Producers enqueue synchronously; the worker takes the receiver
//! for one iteration at a time and acknowledges every item it dequeues.
//!
//! ## Architecture
//! ```text
//! emit()/replay() ──put(Task)──┐
//! emit()/replay() ──put(Task)──┼──► [ unbounded mpsc ] ──► worker: receiver() ─► recv_timeout()
//! shutdown()      ──put(Stop)──┘        pending += 1                       └─► task_done(): pending -= 1
//!                                                                                 └─► 0 → wake join()
//! ```
//!
//! ## Rules
//! - **FIFO**: items are dequeued in enqueue order.
//! - **Snapshot**: a task carries the subscriber list resolved at enqueue time.
//! - **Exclusive receiver**: only one consumer iterates at a time; a second one
//!   observes [`QueueError::Contended`].
//! - **Drain**: `join()` resolves once every enqueued item (including `Stop`)
//!   has been acknowledged.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, Notify, mpsc};

use crate::error::QueueError;
use crate::subscribers::Subscriber;

/// Event bound to the subscribers resolved when it was enqueued.
#[derive(Clone, Debug)]
pub struct DispatchTask {
    /// Concrete topic the event was emitted on.
    pub topic: Arc<str>,
    /// Payload shared by every subscriber of the task.
    pub payload: Arc<Value>,
    /// Subscribers in invocation order.
    pub subscribers: Vec<Subscriber>,
}

/// Queue item.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Task(DispatchTask),
    /// Shutdown sentinel; the worker exits after acknowledging it.
    Stop,
}

/// FIFO of dispatch tasks with drain tracking.
#[derive(Debug)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Dispatch>,
    rx: Mutex<mpsc::UnboundedReceiver<Dispatch>>,
    pending: AtomicUsize,
    drained: Notify,
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Enqueues an item; never blocks. Gives the item back if the channel is closed.
    pub(crate) fn put(&self, item: Dispatch) -> Result<(), Dispatch> {
        self.pending.fetch_add(1, AtomicOrdering::AcqRel);
        self.tx.send(item).map_err(|mpsc::error::SendError(item)| {
            self.task_done();
            item
        })
    }

    /// Takes the receiving end for one consumer iteration.
    pub(crate) fn receiver(&self) -> Result<QueueReceiver<'_>, QueueError> {
        self.rx
            .try_lock()
            .map(|rx| QueueReceiver { rx })
            .map_err(|_| QueueError::Contended)
    }

    /// Acknowledges one dequeued item.
    pub(crate) fn task_done(&self) {
        if self.pending.fetch_sub(1, AtomicOrdering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Number of enqueued items not yet acknowledged.
    pub fn pending(&self) -> usize {
        self.pending.load(AtomicOrdering::Acquire)
    }

    /// Waits until every enqueued item has been acknowledged.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Exclusive access to the receiving end, held for one worker iteration.
pub(crate) struct QueueReceiver<'a> {
    rx: MutexGuard<'a, mpsc::UnboundedReceiver<Dispatch>>,
}

impl QueueReceiver<'_> {
    /// Waits up to `wait` for the next item. `Ok(None)` means the wait expired.
    pub(crate) async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<Dispatch>, QueueError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => Err(QueueError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(topic: &str) -> Dispatch {
        Dispatch::Task(DispatchTask {
            topic: topic.into(),
            payload: Arc::new(json!(null)),
            subscribers: Vec::new(),
        })
    }

    #[tokio::test]
    async fn fifo_and_timeout() {
        let q = DispatchQueue::new();
        q.put(task("a.one")).unwrap();
        q.put(task("b.two")).unwrap();
        assert_eq!(q.pending(), 2);

        let mut rx = q.receiver().unwrap();
        let wait = Duration::from_millis(10);
        match rx.recv_timeout(wait).await.unwrap() {
            Some(Dispatch::Task(t)) => assert_eq!(&*t.topic, "a.one"),
            other => panic!("unexpected {other:?}"),
        }
        match rx.recv_timeout(wait).await.unwrap() {
            Some(Dispatch::Task(t)) => assert_eq!(&*t.topic, "b.two"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.recv_timeout(wait).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_receiver_is_contended() {
        let q = DispatchQueue::new();
        let _held = q.receiver().unwrap();
        assert_eq!(q.receiver().err(), Some(QueueError::Contended));
    }

    #[tokio::test]
    async fn join_waits_for_acknowledgements() {
        let q = Arc::new(DispatchQueue::new());
        q.join().await;

        q.put(task("a.one")).unwrap();
        q.put(Dispatch::Stop).unwrap();

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.join().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        q.task_done();
        q.task_done();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("join resolves after drain")
            .unwrap();
        assert_eq!(q.pending(), 0);
    }
}
