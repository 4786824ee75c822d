use logbus::{LogStore, StoreConfig};
use serde_json::json;

fn open() -> (tempfile::TempDir, LogStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(StoreConfig::under(dir.path())).unwrap();
    (dir, store)
}

#[test]
fn orders_and_payments_scenario() {
    let (_dir, store) = open();
    let producer = store.producer();

    let mut both = store.consumer("email_service").unwrap();
    both.subscribe("orders").unwrap();
    both.subscribe("payments").unwrap();
    let mut orders_only = store.consumer("analytics_service").unwrap();
    orders_only.subscribe("orders").unwrap();

    producer.send("orders", &json!({"order_id": 101, "amount": 50})).unwrap();
    producer.send("payments", &json!({"order_id": 101})).unwrap();

    let a = both.poll(None);
    assert_eq!(a.len(), 2);
    assert_eq!(a[0].tagged()["__topic__"], "orders");
    assert_eq!(a[1].tagged()["__topic__"], "payments");

    let b = orders_only.poll(None);
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].tagged(), json!({"order_id": 101, "amount": 50, "__topic__": "orders"}));

    let raw = std::fs::read_to_string(store.segment_path("orders").unwrap()).unwrap();
    assert!(!raw.contains("__topic__"));
}

#[test]
fn offsets_grow_monotonically_to_segment_length() {
    let (_dir, store) = open();
    let producer = store.producer();
    let mut group = store.consumer("g").unwrap();
    group.subscribe("orders").unwrap();

    let mut written = 0;
    let mut last = 0;
    for i in 0..5 {
        written += producer.send("orders", &json!({"seq": i, "pad": "x".repeat(i)})).unwrap();
        let records = group.poll(None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["seq"], i);
        assert!(group.offset("orders") > last);
        last = group.offset("orders");
    }
    assert_eq!(last, written);
    assert_eq!(last, store.segment_len("orders").unwrap());
}

#[test]
fn groups_are_independent_and_resume_after_restart() {
    let (_dir, store) = open();
    let producer = store.producer();

    let mut g1 = store.consumer("g1").unwrap();
    g1.subscribe("a").unwrap();
    g1.subscribe("b").unwrap();
    let mut g2 = store.consumer("g2").unwrap();
    g2.subscribe("a").unwrap();

    producer.send("a", &json!(1)).unwrap();
    producer.send("b", &json!(2)).unwrap();
    producer.send("a", &json!(3)).unwrap();

    assert_eq!(g1.poll(None).len(), 3);
    assert_eq!(g2.poll(None).len(), 2);

    producer.send("a", &json!(4)).unwrap();
    assert_eq!(g1.poll(None).len(), 1);

    drop(g2);
    let mut g2 = store.consumer("g2").unwrap();
    g2.subscribe("a").unwrap();
    let resumed = g2.poll(None);
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].payload, json!(4));
}

#[test]
fn crash_before_commit_redelivers() {
    let (_dir, store) = open();
    store.producer().send("orders", &json!({"id": 1})).unwrap();

    {
        let mut group = store.consumer("worker").unwrap();
        group.subscribe("orders").unwrap();
        let batch = group.fetch(None);
        assert_eq!(batch.len(), 1);
        // process, then crash before commit
    }

    let mut group = store.consumer("worker").unwrap();
    group.subscribe("orders").unwrap();
    let again = group.poll(None);
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].payload, json!({"id": 1}));
    assert!(group.poll(None).is_empty());
}

#[test]
fn producers_sharing_a_store_do_not_interleave() {
    let (_dir, store) = open();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let producer = store.producer();
            std::thread::spawn(move || {
                for i in 0..50 {
                    producer
                        .send("shared", &json!({"thread": t, "i": i, "body": "y".repeat(64)}))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut group = store.consumer("reader").unwrap();
    group.subscribe("shared").unwrap();
    assert_eq!(group.poll(None).len(), 200);
}
