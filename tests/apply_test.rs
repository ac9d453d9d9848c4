mod common;

use common::Harness;
use solana_pg_sink::{ApplyOutcome, ColumnValue, MutationIntent, MutationOp, SinkError, SlotSpan};

fn post_upsert(harness: &Harness, address: &str, uri: &str, slot: Option<u64>) -> MutationIntent {
    let mut intent = MutationIntent::new(harness.table("Post"), MutationOp::Upsert, address)
        .with_slots(slot.map(SlotSpan::at))
        .with_event("createPost");
    intent.bind("metadata_uri", ColumnValue::Text(uri.to_string()));
    intent
}

fn post_update(harness: &Harness, address: &str, uri: &str, slot: Option<u64>) -> MutationIntent {
    let mut intent = MutationIntent::new(harness.table("Post"), MutationOp::Update, address)
        .with_slots(slot.map(SlotSpan::at))
        .with_event("updatePost");
    intent.bind("metadata_uri", ColumnValue::Text(uri.to_string()));
    intent
}

fn post_delete(harness: &Harness, address: &str, slot: Option<u64>) -> MutationIntent {
    MutationIntent::new(harness.table("Post"), MutationOp::Delete, address)
        .with_slots(slot.map(SlotSpan::at))
        .with_event("deletePost")
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let harness = Harness::new().await;
    let intent = post_upsert(&harness, "A", "uri-1", Some(100));

    assert_eq!(harness.engine.apply(&intent).await.unwrap(), ApplyOutcome::Inserted);
    assert_eq!(harness.engine.apply(&intent).await.unwrap(), ApplyOutcome::Upserted);

    let table = harness.table("Post");
    assert_eq!(harness.store.row_count(&table).await, 1);
    let row = harness.store.row(&table, "A").await.unwrap();
    assert_eq!(row.slot_created_at, 100);
    assert_eq!(row.slot_updated_at, 100);
    assert_eq!(row.get("metadata_uri"), &ColumnValue::Text("uri-1".into()));
}

#[tokio::test]
async fn test_backfill_span_then_older_stream_event() {
    let harness = Harness::new().await;
    let table = harness.table("Post");

    let backfill = post_upsert(&harness, "A", "uri-2", None).with_slots(Some(SlotSpan::range(100, 200)));
    harness.engine.apply(&backfill).await.unwrap();

    // Stream redelivers the original create later.
    harness
        .engine
        .apply(&post_upsert(&harness, "A", "uri-1", Some(100)))
        .await
        .unwrap();

    let row = harness.store.row(&table, "A").await.unwrap();
    assert_eq!(row.slot_created_at, 100);
    assert_eq!(row.slot_updated_at, 200);
}

#[tokio::test]
async fn test_created_slot_takes_smallest_non_zero() {
    let harness = Harness::new().await;
    let table = harness.table("Post");

    harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", None))
        .await
        .unwrap();
    assert_eq!(harness.store.row(&table, "A").await.unwrap().slot_created_at, 0);

    harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(150)))
        .await
        .unwrap();
    harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(120)))
        .await
        .unwrap();
    let row = harness.store.row(&table, "A").await.unwrap();
    assert_eq!(row.slot_created_at, 120);
    assert_eq!(row.slot_updated_at, 150);
}

#[tokio::test]
async fn test_update_never_creates_and_keeps_created_slot() {
    let harness = Harness::new().await;
    let table = harness.table("Post");

    let outcome = harness
        .engine
        .apply(&post_update(&harness, "A", "uri", Some(10)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Missing);
    assert_eq!(harness.store.row_count(&table).await, 0);

    harness
        .engine
        .apply(&post_upsert(&harness, "A", "uri-1", Some(100)))
        .await
        .unwrap();
    let outcome = harness
        .engine
        .apply(&post_update(&harness, "A", "uri-2", Some(300)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Updated);

    let row = harness.store.row(&table, "A").await.unwrap();
    assert_eq!(row.get("metadata_uri"), &ColumnValue::Text("uri-2".into()));
    assert_eq!(row.slot_created_at, 100);
    assert_eq!(row.slot_updated_at, 300);
}

#[tokio::test]
async fn test_delete_then_stale_upsert_stays_deleted() {
    let harness = Harness::new().await;
    let table = harness.table("Post");

    harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(100)))
        .await
        .unwrap();
    let outcome = harness
        .engine
        .apply(&post_delete(&harness, "A", Some(200)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Deleted);
    assert_eq!(harness.store.tombstone(&table, "A").await, Some(200));

    // Redelivered create from before the delete.
    let outcome = harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(100)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Superseded);
    assert!(harness.store.row(&table, "A").await.is_none());

    // A genuinely newer create reuses the address.
    let outcome = harness
        .engine
        .apply(&post_upsert(&harness, "A", "u2", Some(300)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Inserted);
    assert_eq!(harness.store.tombstone(&table, "A").await, None);
}

#[tokio::test]
async fn test_stale_delete_is_superseded() {
    let harness = Harness::new().await;
    let table = harness.table("Post");

    harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(500)))
        .await
        .unwrap();
    let outcome = harness
        .engine
        .apply(&post_delete(&harness, "A", Some(400)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Superseded);
    assert!(harness.store.row(&table, "A").await.is_some());
}

#[tokio::test]
async fn test_delete_of_absent_row_is_noop() {
    let harness = Harness::new().await;
    let outcome = harness
        .engine
        .apply(&post_delete(&harness, "nobody", None))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Absent);
    assert_eq!(harness.store.tombstone(&harness.table("Post"), "nobody").await, None);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let harness = Harness::new().await;
    harness.store.inject_failures(2).await;

    let outcome = harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(1)))
        .await
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Inserted);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_transient() {
    let harness = Harness::new().await;
    harness.store.inject_failures(10).await;

    let err = harness
        .engine
        .apply(&post_upsert(&harness, "A", "u", Some(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::RetryExhausted { .. }));
    assert!(err.is_transient());
    assert!(harness.store.row(&harness.table("Post"), "A").await.is_none());
}

#[tokio::test]
async fn test_invalid_intents_are_rejected() {
    let harness = Harness::new().await;

    let mut unknown_column = post_upsert(&harness, "A", "u", None);
    unknown_column.bind("likes", ColumnValue::Integer(1));
    assert!(matches!(
        harness.engine.apply(&unknown_column).await,
        Err(SinkError::InvalidIntent(_))
    ));

    let mut bookkeeping = post_upsert(&harness, "A", "u", None);
    bookkeeping.bind("slot_updated_at", ColumnValue::Integer(1));
    assert!(matches!(
        harness.engine.apply(&bookkeeping).await,
        Err(SinkError::InvalidIntent(_))
    ));

    let no_address = post_upsert(&harness, "", "u", None);
    assert!(matches!(
        harness.engine.apply(&no_address).await,
        Err(SinkError::InvalidIntent(_))
    ));
}
