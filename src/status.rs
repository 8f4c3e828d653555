//! Per-user sync state: `pending -> syncing -> {success | failed}`.
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tracing::{instrument, warn};

use crate::db::{self, Pool};
use crate::model::{SyncStatus, SyncStatusView};

async fn transition(
    pool: &Pool,
    user_id: i64,
    next: SyncStatus,
    last_sync_at: Option<DateTime<Utc>>,
) -> Result<()> {
    if let Some((current, _)) = db::get_sync_status(pool, user_id).await? {
        if !current.can_transition_to(next) {
            // Overlapping runs for one user are not serialized; last writer wins.
            warn!(
                user_id,
                from = current.as_str(),
                to = next.as_str(),
                "unexpected sync status transition"
            );
        }
    }
    db::set_sync_status(pool, user_id, next, last_sync_at).await
}

#[instrument(skip(pool))]
pub async fn mark_syncing(pool: &Pool, user_id: i64) -> Result<()> {
    transition(pool, user_id, SyncStatus::Syncing, None).await
}

#[instrument(skip(pool))]
pub async fn mark_success(pool: &Pool, user_id: i64, at: DateTime<Utc>) -> Result<()> {
    transition(pool, user_id, SyncStatus::Success, Some(at)).await
}

/// `last_sync_at` keeps pointing at the last successful sync.
#[instrument(skip(pool))]
pub async fn mark_failed(pool: &Pool, user_id: i64) -> Result<()> {
    transition(pool, user_id, SyncStatus::Failed, None).await
}

/// Current status plus a summary of the user's cache. `None` for unknown users.
#[instrument(skip(pool))]
pub async fn sync_status(pool: &Pool, user_id: i64) -> Result<Option<SyncStatusView>> {
    let Some((status, last_sync_at)) = db::get_sync_status(pool, user_id).await? else {
        return Ok(None);
    };
    let stats = db::post_stats(pool, user_id).await?;
    Ok(Some(SyncStatusView {
        status,
        last_sync_at,
        posts_count: stats.count,
        latest_post_date: stats
            .latest_created_at_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
    }))
}
