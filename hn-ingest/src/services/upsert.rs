//! Idempotent diff-based item upsert
//!
//! One transaction per batch. For each item: insert when the id is new,
//! otherwise merge the present fields into the stored row and write it only
//! if something changed. Any failure rolls the whole batch back.

use crate::db::items;
use crate::models::{Item, UpsertSummary};
use crate::utils::retry_on_lock;
use hn_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Upsert `batch`, retrying the whole transaction while the database is locked
pub async fn upsert_items(pool: &SqlitePool, batch: &[Item], max_lock_wait_ms: u64) -> Result<UpsertSummary> {
    if batch.is_empty() {
        return Ok(UpsertSummary::default());
    }

    let summary = retry_on_lock("item upsert", max_lock_wait_ms, || upsert_once(pool, batch)).await?;

    info!(
        total = summary.total_items,
        new = summary.new_items,
        updated = summary.updated_items,
        skipped = summary.skipped_items,
        "Upsert committed"
    );

    Ok(summary)
}

async fn upsert_once(pool: &SqlitePool, batch: &[Item]) -> Result<UpsertSummary> {
    let mut tx = pool.begin().await?;

    let mut summary = UpsertSummary {
        total_items: batch.len(),
        ..Default::default()
    };

    for item in batch {
        match items::find_item(&mut *tx, item.id).await? {
            None => {
                items::insert_item(&mut *tx, item).await?;
                summary.new_items += 1;
            }
            Some(mut stored) => {
                if stored.merge_from(item) {
                    items::update_item(&mut *tx, &stored).await?;
                    summary.updated_items += 1;
                } else {
                    debug!(item_id = item.id, "Item unchanged, skipping write");
                }
            }
        }
    }

    tx.commit().await?;

    summary.stored_count = summary.new_items + summary.updated_items;
    summary.skipped_items = summary.total_items - summary.stored_count;
    Ok(summary)
}
