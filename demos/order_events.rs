//! # Example: order_events
//!
//! Runs a small order flow through the [`EventBus`], then replays the event
//! log into a fresh analytics subscriber as if the process had restarted.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait and wrap closures with [`Subscriber::from_fn`].
//! - Mix exact and `order.*` wildcard subscriptions.
//! - Survive a failing subscriber (user 501 cannot receive email).
//! - Replay the log against the current subscriptions.
//!
//! ## Flow
//! ```text
//! phase 1: emit order.created / order.paid ──► email, sms, analytics, LogWriter
//!          worker.shutdown()  (drains the queue)
//! phase 2: clear(), subscribe replay counter on order.*
//!          replay_file(events.log) ──► counter
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example order_events --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use logbus::{BusConfig, EventBus, LogWriter, Subscribe, Subscriber, SubscriberError};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Sends an email for every new order; user 501 has a broken mailbox.
struct EmailSender;

#[async_trait]
impl Subscribe for EmailSender {
    async fn on_event(&self, _topic: &str, payload: &Value) -> Result<(), SubscriberError> {
        let user = payload["user_id"].as_u64().unwrap_or_default();
        if user == 501 {
            return Err(SubscriberError::fail(format!("mailbox of user {user} rejected the message")));
        }
        println!("[email] order #{} created, mail sent to user {user}", payload["order_id"]);
        Ok(())
    }

    fn name(&self) -> &str {
        "email"
    }
}

#[derive(Default)]
struct Totals {
    created: AtomicU64,
    paid: AtomicU64,
}

impl Totals {
    fn count(&self, topic: &str) {
        match topic {
            "order.created" => self.created.fetch_add(1, Ordering::Relaxed),
            "order.paid" => self.paid.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    fn print(&self, label: &str) {
        println!();
        println!("{label}:");
        println!(" ├─► Orders created: {}", self.created.load(Ordering::Relaxed));
        println!(" └─► Orders paid:    {}", self.paid.load(Ordering::Relaxed));
    }
}

fn analytics(name: &'static str, totals: &Arc<Totals>) -> Subscriber {
    let totals = Arc::clone(totals);
    Subscriber::from_fn(name, move |topic: String, _payload: Value| {
        let totals = Arc::clone(&totals);
        async move {
            totals.count(&topic);
            Ok::<_, SubscriberError>(())
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let log_path = std::env::temp_dir().join("logbus-order-events.log");
    if log_path.exists() {
        std::fs::remove_file(&log_path)?;
    }
    let cfg = BusConfig {
        event_log: Some(log_path.clone()),
        ..BusConfig::default()
    };

    println!("=== phase 1: normal operation ===");
    let bus = EventBus::builder(cfg)
        .with_subscription("order.*", Subscriber::new(LogWriter::new()))
        .build();
    let live = Arc::new(Totals::default());

    bus.subscribe("order.created", Subscriber::new(EmailSender));
    bus.subscribe("order.created", analytics("analytics", &live));
    bus.subscribe("order.paid", analytics("analytics", &live));
    bus.subscribe(
        "order.paid",
        Subscriber::from_fn("sms", |_topic: String, payload: Value| async move {
            println!("[sms] order #{} paid", payload["order_id"]);
            Ok::<_, SubscriberError>(())
        }),
    );

    let worker = bus.spawn_worker();
    bus.emit("order.created", json!({"user_id": 100, "order_id": 1, "amount": 50.0}));
    bus.emit("order.paid", json!({"order_id": 1}));
    bus.emit("order.created", json!({"user_id": 501, "order_id": 2, "amount": 100.0}));
    bus.emit("user.logged_in", json!({"user_id": 100}));

    let report = worker.shutdown().await;
    println!(
        "worker stopped: tasks={} delivered={} failed={}",
        report.tasks, report.delivered, report.failed
    );
    live.print("Live totals");

    println!();
    println!("=== phase 2: replay ===");
    bus.clear();
    let replayed = Arc::new(Totals::default());
    bus.subscribe("order.*", analytics("replay", &replayed));

    let worker = bus.spawn_worker();
    let summary = bus.replay_file(&log_path)?;
    worker.shutdown().await;

    println!(
        "replay: replayed={} ignored={} malformed={}",
        summary.replayed,
        summary.ignored,
        summary.malformed.len()
    );
    replayed.print("Replayed totals (expect 2 created, 1 paid)");
    Ok(())
}
