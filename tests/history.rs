// tests/history.rs
// Aggregation over seeded snapshots: chronological ordering, latest-summary
// semantics, idempotent reads.

use chrono::{TimeZone, Utc};
use price_tracker::history;
use price_tracker::model::{NewResult, Priority};
use price_tracker::store::Store;

fn result(item_id: i64, source_key: &str, snapshot_id: i64, title: &str, price: f64) -> NewResult {
    NewResult {
        title: title.to_string(),
        price,
        category: None,
        instock: 1,
        item_id,
        source_key: source_key.to_string(),
        snapshot_id,
    }
}

async fn seeded_store() -> Store {
    let store = Store::open_in_memory().await.unwrap();
    store.insert_source("aaa", "Shop A").await.unwrap();
    store
}

#[tokio::test]
async fn full_history_is_ascending_min_per_snapshot() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    let s2 = store.create_snapshot_at(t2).await.unwrap();

    // Inserted newest-first on purpose: order must come from the query,
    // not from insertion order.
    store
        .save_batch(&[result(x.id, "aaa", s2.id, "offer c", 8.0)])
        .await
        .unwrap();
    store
        .save_batch(&[
            result(x.id, "aaa", s1.id, "offer a", 10.0),
            result(x.id, "aaa", s1.id, "offer b", 12.0),
        ])
        .await
        .unwrap();

    let series = history::full_history(&store, x.id).await.unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].price, 10.0);
    assert_eq!(series[0].timestamp, t1);
    assert_eq!(series[1].price, 8.0);
    assert_eq!(series[1].timestamp, t2);
}

#[tokio::test]
async fn history_length_equals_snapshots_containing_the_item() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();
    let y = store.insert_item("ryzen 9800", Priority::B).await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
    let t3 = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    let s2 = store.create_snapshot_at(t2).await.unwrap();
    let s3 = store.create_snapshot_at(t3).await.unwrap();

    store
        .save_batch(&[
            result(x.id, "aaa", s1.id, "x1", 10.0),
            result(x.id, "aaa", s3.id, "x3", 9.0),
            result(y.id, "aaa", s2.id, "y2", 300.0),
        ])
        .await
        .unwrap();

    assert_eq!(history::full_history(&store, x.id).await.unwrap().len(), 2);
    assert_eq!(history::full_history(&store, y.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn item_without_results_has_empty_history() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();
    assert!(history::full_history(&store, x.id).await.unwrap().is_empty());
    assert!(history::latest_summary(&store, x.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reads_are_idempotent_between_cycles() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();
    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    store
        .save_batch(&[result(x.id, "aaa", s1.id, "x1", 10.0)])
        .await
        .unwrap();

    let first = history::full_history(&store, x.id).await.unwrap();
    let second = history::full_history(&store, x.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn latest_summary_picks_cheapest_in_newest_snapshot() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    let s2 = store.create_snapshot_at(t2).await.unwrap();

    store
        .save_batch(&[
            result(x.id, "aaa", s1.id, "old cheap", 1.0),
            result(x.id, "aaa", s2.id, "current best", 8.0),
            result(x.id, "aaa", s2.id, "current other", 9.5),
        ])
        .await
        .unwrap();

    let summary = history::latest_summary(&store, x.id).await.unwrap().unwrap();
    assert_eq!(summary.price, 8.0);
    assert_eq!(summary.title, "current best");
    assert_eq!(summary.timestamp, t2);
}

#[tokio::test]
async fn latest_summary_is_absent_when_newest_snapshot_misses_the_item() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();
    let y = store.insert_item("ryzen 9800", Priority::B).await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    let s2 = store.create_snapshot_at(t2).await.unwrap();

    // x only appears in the older snapshot; y keeps the newest one non-empty.
    store
        .save_batch(&[
            result(x.id, "aaa", s1.id, "stale offer", 10.0),
            result(y.id, "aaa", s2.id, "fresh offer", 300.0),
        ])
        .await
        .unwrap();

    assert!(history::latest_summary(&store, x.id)
        .await
        .unwrap()
        .is_none());
    assert!(history::latest_summary(&store, y.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn listing_serializes_dates_day_month_year() {
    let store = seeded_store().await;
    let x = store.insert_item("rtx 5070", Priority::B).await.unwrap();

    let t1 = Utc.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap();
    let s1 = store.create_snapshot_at(t1).await.unwrap();
    store
        .save_batch(&[result(x.id, "aaa", s1.id, "offer", 549.0)])
        .await
        .unwrap();

    let listing = history::listing(&store).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].id, x.id);
    assert_eq!(listing[0].price_history.len(), 1);
    assert_eq!(listing[0].price_history[0].date, "07/03/25");
    let latest = listing[0].latest.as_ref().unwrap();
    assert_eq!(latest.price, 549.0);
}
