//! Runs against a live database: `TEST_DATABASE_URL=... cargo test -- --ignored`.

mod common;

use common::{fast_retry, gum_idl};
use solana_pg_sink::config::StoreConfig;
use solana_pg_sink::{
    ApplyEngine, ApplyOutcome, ColumnValue, MutationIntent, MutationOp, PgStore, SchemaCatalog,
    SchemaSynthesizer, SlotSpan,
};
use std::sync::Arc;

async fn setup(schema: &str) -> (Arc<PgStore>, ApplyEngine, Arc<SchemaCatalog>) {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let store = Arc::new(PgStore::new(&url, &StoreConfig::default(), schema).await.unwrap());
    sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .execute(store.pool())
        .await
        .unwrap();
    store.initialize().await.unwrap();

    let synthesizer = SchemaSynthesizer::new(schema, Vec::new());
    let specs = synthesizer.plan(&gum_idl());
    synthesizer.synthesize(store.as_ref(), &specs).await.unwrap();
    let catalog = Arc::new(SchemaCatalog::new(specs).unwrap());
    let engine = ApplyEngine::new(store.clone(), Arc::clone(&catalog), fast_retry());
    (store, engine, catalog)
}

fn upsert(catalog: &SchemaCatalog, address: &str, slots: SlotSpan) -> MutationIntent {
    let mut intent = MutationIntent::new(
        catalog.record("Post").unwrap().table.clone(),
        MutationOp::Upsert,
        address,
    )
    .with_slots(Some(slots));
    intent.bind("metadata_uri", ColumnValue::Text("uri".into()));
    intent.bind(
        "random_hash",
        ColumnValue::Array(vec![ColumnValue::Integer(1), ColumnValue::Integer(2)]),
    );
    intent
}

#[tokio::test]
#[ignore = "Requires database connection"]
async fn test_upsert_merges_slots() {
    let (store, engine, catalog) = setup("sink_test_upsert").await;

    let first = engine
        .apply(&upsert(&catalog, "A", SlotSpan::range(100, 200)))
        .await
        .unwrap();
    let second = engine
        .apply(&upsert(&catalog, "A", SlotSpan::at(90)))
        .await
        .unwrap();
    assert_eq!(first, ApplyOutcome::Inserted);
    assert_eq!(second, ApplyOutcome::Upserted);

    let (created, updated): (i64, i64) = sqlx::query_as(
        "SELECT slot_created_at, slot_updated_at FROM sink_test_upsert.post WHERE address = 'A'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!((created, updated), (90, 200));

    let hash: Vec<i32> =
        sqlx::query_scalar("SELECT random_hash FROM sink_test_upsert.post WHERE address = 'A'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(hash, vec![1, 2]);
    store.close().await;
}

#[tokio::test]
#[ignore = "Requires database connection"]
async fn test_delete_leaves_tombstone() {
    let (store, engine, catalog) = setup("sink_test_delete").await;
    let table = catalog.record("Post").unwrap().table.clone();

    engine
        .apply(&upsert(&catalog, "A", SlotSpan::at(100)))
        .await
        .unwrap();
    let delete = MutationIntent::new(table, MutationOp::Delete, "A").with_slots(Some(SlotSpan::at(150)));
    assert_eq!(engine.apply(&delete).await.unwrap(), ApplyOutcome::Deleted);
    assert_eq!(engine.apply(&delete).await.unwrap(), ApplyOutcome::Absent);

    let stale = engine
        .apply(&upsert(&catalog, "A", SlotSpan::at(120)))
        .await
        .unwrap();
    assert_eq!(stale, ApplyOutcome::Superseded);

    let fresh = engine
        .apply(&upsert(&catalog, "A", SlotSpan::at(160)))
        .await
        .unwrap();
    assert_eq!(fresh, ApplyOutcome::Inserted);
    store.close().await;
}

#[tokio::test]
#[ignore = "Requires database connection"]
async fn test_concurrent_upsert_never_outlives_newer_delete() {
    let (store, engine, catalog) = setup("sink_test_race").await;
    let table = catalog.record("Post").unwrap().table.clone();

    let mut handles = Vec::new();
    for i in 0..25 {
        let address = format!("addr-{i}");
        let write = upsert(&catalog, &address, SlotSpan::at(120));
        let delete = MutationIntent::new(table.clone(), MutationOp::Delete, address)
            .with_slots(Some(SlotSpan::at(130)));
        let (a, b) = (engine.clone(), engine.clone());
        handles.push(tokio::spawn(async move { a.apply(&write).await }));
        handles.push(tokio::spawn(async move { b.apply(&delete).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whichever ran first, the delete at 130 wins over the upsert at 120.
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sink_test_race.post")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 0);
    store.close().await;
}
