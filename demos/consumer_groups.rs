//! # Example: consumer_groups
//!
//! Two consumer groups read the same log store at their own pace, and one of
//! them restarts and resumes from its persisted offset.
//!
//! ## Flow
//! ```text
//! email_service     subscribes orders + payments
//! analytics_service subscribes orders
//!
//! send orders, payments, orders ──► email polls 3, analytics polls 2
//! send orders                   ──► email polls 1
//! analytics restarts            ──► polls 1 (offset reloaded from disk)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=logbus=debug cargo run --example consumer_groups
//! ```

use logbus::{LogStore, PolledRecord, StoreConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn show(group: &str, records: &[PolledRecord]) {
    println!("{group}: {} record(s)", records.len());
    for record in records {
        println!("  └─► {}", record.tagged());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = std::env::temp_dir().join("logbus-consumer-groups");
    if root.exists() {
        std::fs::remove_dir_all(&root)?;
    }
    let store = LogStore::open(StoreConfig::under(&root))?;
    let producer = store.producer();

    let mut email = store.consumer("email_service")?;
    email.subscribe("orders")?;
    email.subscribe("payments")?;

    let mut analytics = store.consumer("analytics_service")?;
    analytics.subscribe("orders")?;

    println!("--- stage 1: three records ---");
    producer.send("orders", &json!({"type": "ORDER_CREATED", "id": 101, "amount": 50}))?;
    producer.send("payments", &json!({"type": "PAYMENT_REQUEST", "order_id": 101}))?;
    producer.send("orders", &json!({"type": "ORDER_UPDATED", "id": 102, "amount": 100}))?;

    show("email_service", &email.poll(None));
    show("analytics_service", &analytics.poll(None));

    println!("--- stage 2: one more record ---");
    producer.send("orders", &json!({"type": "ORDER_SHIPPED", "id": 102}))?;
    show("email_service", &email.poll(None));

    println!("--- stage 3: analytics_service restarts ---");
    drop(analytics);
    let mut restarted = store.consumer("analytics_service")?;
    restarted.subscribe("orders")?;
    println!("resuming orders at byte {}", restarted.offset("orders"));
    show("analytics_service (restarted)", &restarted.poll(None));

    Ok(())
}
