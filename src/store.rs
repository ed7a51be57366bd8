// src/store.rs
//! SQLite-backed result store.
//!
//! Owns the five-entity schema (sources, items, subscriptions, snapshots,
//! results) with cascade-delete foreign keys, and the read primitives the
//! aggregator composes. A cycle's results are written in one transaction:
//! either every row lands or none do.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

use crate::model::{ActiveSubscription, Item, NewResult, Priority, ResultRow, Snapshot, Source};

/// Storage failure. Unlike lookup errors this surfaces to the cycle caller:
/// a failed batch write fails the whole cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sources (
        key  TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS items (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        text     TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 2,
        active   INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id    INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        source_key TEXT NOT NULL REFERENCES sources(key) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS snapshots (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON snapshots(timestamp)",
    "CREATE TABLE IF NOT EXISTS results (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        title       TEXT NOT NULL,
        price       REAL NOT NULL CHECK (price >= 0.0),
        category    TEXT,
        instock     INTEGER NOT NULL DEFAULT 1,
        item_id     INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        source_key  TEXT NOT NULL REFERENCES sources(key) ON DELETE CASCADE,
        snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_results_item_snapshot ON results(item_id, snapshot_id)",
];

/// Per-(item, snapshot) minimum price joined with the snapshot timestamp.
/// The aggregator's one-query primitive.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MinPriceRow {
    pub item_id: i64,
    pub snapshot_id: i64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Cheapest offer per item within one snapshot.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CheapestRow {
    pub item_id: i64,
    pub title: String,
    pub price: f64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) a database at the given `sqlite:` URL and
    /// ensure the schema exists. Foreign keys are enabled on every
    /// connection; cascades depend on it.
    pub async fn open(database_url: &str) -> Result<Self> {
        let opts = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests. Pinned to one connection: every SQLite
    /// `:memory:` connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = "sqlite::memory:"
            .parse::<SqliteConnectOptions>()?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- reference data & subscriptions ----

    pub async fn insert_source(&self, key: &str, name: &str) -> Result<Source> {
        sqlx::query("INSERT INTO sources (key, name) VALUES (?1, ?2)")
            .bind(key)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Source {
            key: key.to_string(),
            name: name.to_string(),
        })
    }

    pub async fn insert_item(&self, text: &str, priority: Priority) -> Result<Item> {
        let res = sqlx::query("INSERT INTO items (text, priority) VALUES (?1, ?2)")
            .bind(text)
            .bind(priority)
            .execute(&self.pool)
            .await?;
        Ok(Item {
            id: res.last_insert_rowid(),
            text: text.to_string(),
            priority,
            active: true,
        })
    }

    pub async fn subscribe(&self, item_id: i64, source_key: &str) -> Result<i64> {
        let res = sqlx::query("INSERT INTO subscriptions (item_id, source_key) VALUES (?1, ?2)")
            .bind(item_id)
            .bind(source_key)
            .execute(&self.pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn set_item_active(&self, item_id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE items SET active = ?2 WHERE id = ?1")
            .bind(item_id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_item_priority(&self, item_id: i64, priority: Priority) -> Result<()> {
        sqlx::query("UPDATE items SET priority = ?2 WHERE id = ?1")
            .bind(item_id)
            .bind(priority)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cascades away the item's subscriptions and results.
    pub async fn delete_item(&self, item_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cascades away the source's subscriptions and results.
    pub async fn delete_source(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM sources WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn items(&self) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT id, text, priority, active FROM items ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Subscriptions whose item is active. An empty list is a normal
    /// outcome, not an error. Ordered by item priority tier so
    /// higher-priority items enter the worker pool first.
    pub async fn active_subscriptions(&self) -> Result<Vec<ActiveSubscription>> {
        let rows = sqlx::query(
            "SELECT sub.id AS subscription_id,
                    i.id AS item_id, i.text, i.priority, i.active,
                    src.key AS source_key, src.name AS source_name
             FROM subscriptions sub
             JOIN items i ON i.id = sub.item_id
             JOIN sources src ON src.key = sub.source_key
             WHERE i.active = 1
             ORDER BY i.priority ASC, sub.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut subs = Vec::with_capacity(rows.len());
        for row in rows {
            subs.push(ActiveSubscription {
                subscription_id: row.try_get("subscription_id")?,
                item: Item {
                    id: row.try_get("item_id")?,
                    text: row.try_get("text")?,
                    priority: row.try_get("priority")?,
                    active: row.try_get("active")?,
                },
                source: Source {
                    key: row.try_get("source_key")?,
                    name: row.try_get("source_name")?,
                },
            });
        }
        Ok(subs)
    }

    // ---- snapshots ----

    pub async fn create_snapshot(&self) -> Result<Snapshot> {
        self.create_snapshot_at(Utc::now()).await
    }

    /// Explicit-timestamp form, for tests and backfills.
    pub async fn create_snapshot_at(&self, timestamp: DateTime<Utc>) -> Result<Snapshot> {
        let res = sqlx::query("INSERT INTO snapshots (timestamp) VALUES (?1)")
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(Snapshot {
            id: res.last_insert_rowid(),
            timestamp,
        })
    }

    /// The snapshot with the maximum timestamp, i.e. the latest update.
    pub async fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let snap = sqlx::query_as::<_, Snapshot>(
            "SELECT id, timestamp FROM snapshots ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(snap)
    }

    // ---- results ----

    /// Persist one cycle's collected results in a single transaction.
    /// No partial-batch visibility: all rows or none.
    pub async fn save_batch(&self, batch: &[NewResult]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in batch {
            sqlx::query(
                "INSERT INTO results (title, price, category, instock, item_id, source_key, snapshot_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&r.title)
            .bind(r.price)
            .bind(&r.category)
            .bind(r.instock)
            .bind(r.item_id)
            .bind(&r.source_key)
            .bind(r.snapshot_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn results_for_item(&self, item_id: i64) -> Result<Vec<ResultRow>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            "SELECT id, title, price, category, instock, item_id, source_key, snapshot_id
             FROM results WHERE item_id = ?1 ORDER BY id ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn results_for_snapshot(&self, snapshot_id: i64) -> Result<Vec<ResultRow>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            "SELECT id, title, price, category, instock, item_id, source_key, snapshot_id
             FROM results WHERE snapshot_id = ?1 ORDER BY id ASC",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn results_for_item_in_snapshot(
        &self,
        item_id: i64,
        snapshot_id: i64,
    ) -> Result<Vec<ResultRow>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            "SELECT id, title, price, category, instock, item_id, source_key, snapshot_id
             FROM results WHERE item_id = ?1 AND snapshot_id = ?2 ORDER BY id ASC",
        )
        .bind(item_id)
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Minimum price per (item, snapshot) across the whole table, joined
    /// with the snapshot timestamp, chronologically ascending.
    pub async fn min_price_by_item_snapshot(&self) -> Result<Vec<MinPriceRow>> {
        let rows = sqlx::query_as::<_, MinPriceRow>(
            "SELECT r.item_id AS item_id, r.snapshot_id AS snapshot_id,
                    MIN(r.price) AS price, s.timestamp AS timestamp
             FROM results r
             JOIN snapshots s ON s.id = r.snapshot_id
             GROUP BY r.item_id, r.snapshot_id
             ORDER BY s.timestamp ASC, r.snapshot_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Single-item form of the grouped minimum.
    pub async fn min_price_for_item(&self, item_id: i64) -> Result<Vec<MinPriceRow>> {
        let rows = sqlx::query_as::<_, MinPriceRow>(
            "SELECT r.item_id AS item_id, r.snapshot_id AS snapshot_id,
                    MIN(r.price) AS price, s.timestamp AS timestamp
             FROM results r
             JOIN snapshots s ON s.id = r.snapshot_id
             WHERE r.item_id = ?1
             GROUP BY r.snapshot_id
             ORDER BY s.timestamp ASC, r.snapshot_id ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The minimum-price result for one item within one snapshot, or None
    /// when the snapshot holds nothing for that item.
    pub async fn cheapest_in_snapshot(
        &self,
        item_id: i64,
        snapshot_id: i64,
    ) -> Result<Option<ResultRow>> {
        let row = sqlx::query_as::<_, ResultRow>(
            "SELECT id, title, price, category, instock, item_id, source_key, snapshot_id
             FROM results WHERE item_id = ?1 AND snapshot_id = ?2
             ORDER BY price ASC, id ASC LIMIT 1",
        )
        .bind(item_id)
        .bind(snapshot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Cheapest offer per item within one snapshot, one query for the whole
    /// listing. SQLite's bare-column-with-MIN semantics pin `title` to the
    /// minimum-price row.
    pub async fn cheapest_per_item_in_snapshot(
        &self,
        snapshot_id: i64,
    ) -> Result<Vec<CheapestRow>> {
        let rows = sqlx::query_as::<_, CheapestRow>(
            "SELECT item_id, title, MIN(price) AS price
             FROM results WHERE snapshot_id = ?1
             GROUP BY item_id",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
