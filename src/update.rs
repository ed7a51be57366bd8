// src/update.rs
//! Update dispatcher: one cycle resolves the active subscriptions, fans out
//! lookups with bounded parallelism, fans the hits back in under a single
//! snapshot, and writes them in one batch.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tokio::time::timeout;

use crate::lookup::registry::SourceRegistry;
use crate::lookup::{LookupError, RawHit};
use crate::model::{ActiveSubscription, NewResult};
use crate::store::{Store, StoreError};

/// Dispatcher knobs. `concurrency` bounds the lookup worker pool;
/// `lookup_timeout` caps each individual lookup.
#[derive(Debug, Clone, Copy)]
pub struct UpdateCfg {
    pub concurrency: usize,
    pub lookup_timeout: Duration,
}

impl Default for UpdateCfg {
    fn default() -> Self {
        Self {
            concurrency: 4,
            lookup_timeout: Duration::from_secs(20),
        }
    }
}

/// A cycle fails only when the batch write does. Lookup failures are
/// logged, counted, and skipped.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One-time metrics registration (so series show up for any installed recorder).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("update_cycles_total", "Update cycles run.");
        describe_counter!(
            "update_results_total",
            "Result rows written across all cycles."
        );
        describe_counter!("update_hits_total", "Raw entries parsed from sources.");
        describe_counter!(
            "update_lookup_errors_total",
            "Failed or timed-out lookups."
        );
        describe_histogram!("update_lookup_ms", "Per-lookup latency in milliseconds.");
        describe_gauge!("update_last_run_ts", "Unix ts when the last cycle ran.");
    });
}

/// Run one update cycle and return the number of results written.
///
/// The snapshot is created before fan-out so every concurrent lookup tags
/// its hits with the same identity; a cycle with no active subscriptions
/// creates nothing at all. Dropping the returned future abandons in-flight
/// lookups and writes nothing: the single batch insert after fan-out is the
/// only write.
pub async fn run_cycle(
    store: &Store,
    registry: &Arc<SourceRegistry>,
    cfg: UpdateCfg,
) -> Result<usize, CycleError> {
    ensure_metrics_described();
    counter!("update_cycles_total").increment(1);
    gauge!("update_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    let subs = store.active_subscriptions().await?;
    if subs.is_empty() {
        tracing::info!("no active subscriptions, nothing to dispatch");
        return Ok(0);
    }

    let snapshot = store.create_snapshot().await?;

    let collected: Vec<Vec<NewResult>> = stream::iter(subs.into_iter().map(|sub| {
        let registry = Arc::clone(registry);
        async move {
            match lookup_one(&registry, &sub, cfg.lookup_timeout).await {
                Ok(hits) => tag_hits(hits, &sub, snapshot.id),
                Err(err) => {
                    tracing::warn!(
                        source = %sub.source.key,
                        term = %sub.item.text,
                        error = %err,
                        "lookup failed"
                    );
                    counter!("update_lookup_errors_total").increment(1);
                    Vec::new()
                }
            }
        }
    }))
    .buffer_unordered(cfg.concurrency.max(1))
    .collect()
    .await;

    let batch: Vec<NewResult> = collected.into_iter().flatten().collect();
    store.save_batch(&batch).await?;

    counter!("update_results_total").increment(batch.len() as u64);
    tracing::info!(
        snapshot = snapshot.id,
        results = batch.len(),
        "update cycle complete"
    );
    Ok(batch.len())
}

async fn lookup_one(
    registry: &SourceRegistry,
    sub: &ActiveSubscription,
    limit: Duration,
) -> Result<Vec<RawHit>, LookupError> {
    let provider = registry
        .resolve(&sub.source.key)
        .ok_or_else(|| LookupError::UnregisteredSource(sub.source.key.clone()))?;
    match timeout(limit, provider.search(&sub.item.text)).await {
        Ok(res) => res,
        Err(_) => Err(LookupError::TimedOut(limit.as_secs())),
    }
}

fn tag_hits(hits: Vec<RawHit>, sub: &ActiveSubscription, snapshot_id: i64) -> Vec<NewResult> {
    hits.into_iter()
        .map(|h| NewResult {
            title: h.title,
            price: h.price,
            category: h.category,
            instock: h.instock,
            item_id: sub.item.id,
            source_key: sub.source.key.clone(),
            snapshot_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Priority, Source};

    fn sub() -> ActiveSubscription {
        ActiveSubscription {
            subscription_id: 1,
            item: Item {
                id: 7,
                text: "rtx 5070".into(),
                priority: Priority::B,
                active: true,
            },
            source: Source {
                key: "ccs".into(),
                name: "CC Search".into(),
            },
        }
    }

    #[test]
    fn tagging_stamps_item_source_and_snapshot() {
        let hits = vec![RawHit {
            title: "GeForce RTX 5070".into(),
            price: 549.0,
            category: Some("gpu".into()),
            instock: 1,
        }];
        let tagged = tag_hits(hits, &sub(), 42);
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].item_id, 7);
        assert_eq!(tagged[0].source_key, "ccs");
        assert_eq!(tagged[0].snapshot_id, 42);
        assert_eq!(tagged[0].price, 549.0);
    }
}
