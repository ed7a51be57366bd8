// src/model.rs
//! Entity types shared by the store, dispatcher, and aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Acquisition priority tier for an item. Lower value = higher priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i32)]
pub enum Priority {
    S = 0,
    A = 1,
    B = 2,
    C = 3,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::B
    }
}

/// A tracked entity whose price is being monitored.
/// `active` gates participation in update cycles.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Item {
    pub id: i64,
    /// Text used both to identify the item and as the search term.
    pub text: String,
    pub priority: Priority,
    pub active: bool,
}

/// An external lookup provider. The key selects which registered lookup
/// capability is used when searching with this source.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Source {
    pub key: String,
    pub name: String,
}

/// The batch identity shared by all results gathered in one update cycle.
/// Timestamp is assigned at creation; the row is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, FromRow, Serialize)]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A subscription joined with its item and source, the unit of work the
/// dispatcher fans out.
#[derive(Debug, Clone)]
pub struct ActiveSubscription {
    pub subscription_id: i64,
    pub item: Item,
    pub source: Source,
}

/// A stored price observation: one item, one source, one snapshot.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ResultRow {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub category: Option<String>,
    pub instock: i32,
    pub item_id: i64,
    pub source_key: String,
    pub snapshot_id: i64,
}

/// An observation collected during a cycle, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub title: String,
    pub price: f64,
    pub category: Option<String>,
    pub instock: i32,
    pub item_id: i64,
    pub source_key: String,
    pub snapshot_id: i64,
}
