// src/history.rs
//! Price-history aggregation. Read-time computation over the result store,
//! no storage of its own: a chronological minimum-price series per item,
//! plus a latest-snapshot summary for annotating listings.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{MinPriceRow, Result, Store};

/// One point of an item's chronological price series: the cheapest offer
/// observed in one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Wire form of a price point for the listing consumer; `date` is
/// day/month/year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub price: f64,
    pub date: String,
}

/// The most recent priced offer for an item: cheapest result within the
/// globally latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSummary {
    pub price: f64,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}

/// Listing read model entry: item identity plus its ascending price series
/// and the latest-snapshot annotation.
#[derive(Debug, Clone, Serialize)]
pub struct ItemListing {
    pub id: i64,
    pub text: String,
    pub price_history: Vec<HistoryPoint>,
    pub latest: Option<LatestSummary>,
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%d/%m/%y").to_string()
}

impl From<PricePoint> for HistoryPoint {
    fn from(p: PricePoint) -> Self {
        Self {
            price: p.price,
            date: format_date(p.timestamp),
        }
    }
}

/// Group a chronologically ordered flat row list by item. One linear pass;
/// each sub-series keeps the query's ascending order.
fn group_by_item(rows: Vec<MinPriceRow>) -> BTreeMap<i64, Vec<PricePoint>> {
    let mut by_item: BTreeMap<i64, Vec<PricePoint>> = BTreeMap::new();
    for row in rows {
        by_item.entry(row.item_id).or_default().push(PricePoint {
            price: row.price,
            timestamp: row.timestamp,
        });
    }
    by_item
}

/// Full chronological price series for every item, computed from one
/// grouped query over the whole result table.
pub async fn full_history_all(store: &Store) -> Result<BTreeMap<i64, Vec<PricePoint>>> {
    let rows = store.min_price_by_item_snapshot().await?;
    Ok(group_by_item(rows))
}

/// Chronological price series for one item. Empty when the item has no
/// results; that is a normal state, not a fault.
pub async fn full_history(store: &Store, item_id: i64) -> Result<Vec<PricePoint>> {
    let rows = store.min_price_for_item(item_id).await?;
    Ok(rows
        .into_iter()
        .map(|r| PricePoint {
            price: r.price,
            timestamp: r.timestamp,
        })
        .collect())
}

/// The item's cheapest offer within the snapshot with the maximum
/// timestamp. None when that snapshot holds nothing for this item, even if
/// older snapshots do.
pub async fn latest_summary(store: &Store, item_id: i64) -> Result<Option<LatestSummary>> {
    let Some(snapshot) = store.latest_snapshot().await? else {
        return Ok(None);
    };
    let row = store.cheapest_in_snapshot(item_id, snapshot.id).await?;
    Ok(row.map(|r| LatestSummary {
        price: r.price,
        title: r.title,
        timestamp: snapshot.timestamp,
    }))
}

/// The listing read model: every tracked item with its ascending
/// `{price, date}` series and latest-snapshot annotation, ordered by item
/// id.
pub async fn listing(store: &Store) -> Result<Vec<ItemListing>> {
    let items = store.items().await?;
    let mut by_item = full_history_all(store).await?;

    let latest = store.latest_snapshot().await?;
    let mut cheapest: HashMap<i64, LatestSummary> = HashMap::new();
    if let Some(snap) = latest {
        for row in store.cheapest_per_item_in_snapshot(snap.id).await? {
            cheapest.insert(
                row.item_id,
                LatestSummary {
                    price: row.price,
                    title: row.title,
                    timestamp: snap.timestamp,
                },
            );
        }
    }

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let series = by_item.remove(&item.id).unwrap_or_default();
        out.push(ItemListing {
            id: item.id,
            text: item.text,
            price_history: series.into_iter().map(HistoryPoint::from).collect(),
            latest: cheapest.remove(&item.id),
        });
    }
    Ok(out)
}
