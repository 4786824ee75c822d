//! # Example: saga
//!
//! An order saga that journals every step to the `saga_log` topic. When a
//! step fails, the steps already done are compensated in reverse order.
//!
//! ## Flow
//! ```text
//! ORDER_CREATED ─► PAYMENT_RESERVED ─► INVENTORY_DEDUCTED ─► DELIVERY_REQUESTED ─► SAGA_COMPLETED
//!
//! failure at inventory:
//! ORDER_CREATED ─► PAYMENT_RESERVED ─► SAGA_FAILED ─► PAYMENT_CANCELLED ─► ORDER_CANCELLED
//! ```
//!
//! An auditor consumer group reads the journal back at the end.
//!
//! ## Run
//! ```bash
//! cargo run --example saga
//! ```

use logbus::{LogStore, Producer, StoreConfig, StoreError};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const SAGA_TOPIC: &str = "saga_log";

/// (event on success, local transaction, compensating event)
const STEPS: [(&str, &str, &str); 4] = [
    ("ORDER_CREATED", "order_service.create", "ORDER_CANCELLED"),
    ("PAYMENT_RESERVED", "payment_service.reserve", "PAYMENT_CANCELLED"),
    ("INVENTORY_DEDUCTED", "inventory_service.deduct", "INVENTORY_RESTORED"),
    ("DELIVERY_REQUESTED", "delivery_service.request", "DELIVERY_CANCELLED"),
];

fn journal(producer: &Producer, saga_id: &str, kind: &str, details: &Value) -> Result<(), StoreError> {
    producer.send(
        SAGA_TOPIC,
        &json!({"saga_id": saga_id, "type": kind, "details": details}),
    )?;
    println!("  [log] {kind}");
    Ok(())
}

fn run_saga(
    producer: &Producer,
    saga_id: &str,
    order: &Value,
    fail_at: Option<&str>,
) -> Result<bool, StoreError> {
    println!("--- saga {saga_id} ---");
    let mut done: Vec<(&str, &str)> = Vec::new();

    for (event, transaction, compensation) in STEPS {
        if fail_at == Some(transaction) {
            println!("  [!] {transaction} failed");
            journal(producer, saga_id, "SAGA_FAILED", &json!({"step": transaction}))?;

            for (transaction, compensation) in done.iter().rev() {
                println!("  [<] compensating {transaction} -> {compensation}");
                journal(producer, saga_id, compensation, order)?;
            }
            return Ok(false);
        }
        println!("  [+] {transaction}");
        journal(producer, saga_id, event, order)?;
        done.push((transaction, compensation));
    }

    journal(producer, saga_id, "SAGA_COMPLETED", &json!({"order_id": saga_id}))?;
    Ok(true)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let root = std::env::temp_dir().join("logbus-saga");
    if root.exists() {
        std::fs::remove_dir_all(&root)?;
    }
    let store = LogStore::open(StoreConfig::under(&root))?;
    let producer = store.producer();

    run_saga(&producer, "order_123_success", &json!({"user_id": 42, "amount": 100.0}), None)?;
    run_saga(
        &producer,
        "order_456_failure",
        &json!({"user_id": 43, "amount": 250.0}),
        Some("inventory_service.deduct"),
    )?;

    let mut auditor = store.consumer("auditor")?;
    auditor.subscribe(SAGA_TOPIC)?;
    println!();
    println!("journal:");
    for record in auditor.poll(None) {
        println!("  {} {}", record.payload["saga_id"], record.payload["type"]);
    }
    Ok(())
}
