use super::model::{PostStats, SyncCandidate};
use crate::model::{CachedPost, MediaType, Post, RunSummary, SyncStatus, User};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    // Readers keep seeing the previous cache while a replace is in flight.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and create the parent
/// directory. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{path}?{q}"),
        None => format!("sqlite://{path}"),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn status_from_row(row: &SqliteRow) -> Result<SyncStatus> {
    let raw: String = row.try_get("sync_status")?;
    SyncStatus::parse_status(&raw).ok_or_else(|| anyhow!("unknown sync status {raw}"))
}

/// Insert a user. Stands in for the user-management side when seeding.
#[instrument(skip_all)]
pub async fn create_user(pool: &Pool, name: &str, token: Option<&str>) -> Result<i64> {
    let rec = sqlx::query("INSERT INTO users (name, dma_token, sync_status) VALUES (?, ?, ?) RETURNING id")
        .bind(name)
        .bind(token)
        .bind(SyncStatus::Pending.as_str())
        .fetch_one(pool)
        .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn set_user_token(pool: &Pool, user_id: i64, token: Option<&str>) -> Result<()> {
    let res = sqlx::query("UPDATE users SET dma_token = ? WHERE id = ?")
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(anyhow!("user {} not found", user_id));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, user_id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, name, dma_token, sync_status, last_sync_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(User {
        id: row.get("id"),
        name: row.get("name"),
        dma_token: row
            .try_get::<Option<String>, _>("dma_token")?
            .filter(|t| !t.trim().is_empty()),
        sync_status: status_from_row(&row)?,
        last_sync_at: row.try_get::<Option<DateTime<Utc>>, _>("last_sync_at")?,
    }))
}

/// Every user holding a usable sync token, in id order.
#[instrument(skip_all)]
pub async fn list_sync_candidates(pool: &Pool) -> Result<Vec<SyncCandidate>> {
    let rows = sqlx::query(
        "SELECT id, name, dma_token FROM users \
         WHERE dma_token IS NOT NULL AND TRIM(dma_token) <> '' \
         ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to list users with sync tokens")?;

    Ok(rows
        .into_iter()
        .map(|row| SyncCandidate {
            id: row.get("id"),
            name: row.get("name"),
            token: row.get("dma_token"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn get_sync_status(pool: &Pool, user_id: i64) -> Result<Option<(SyncStatus, Option<DateTime<Utc>>)>> {
    let row = sqlx::query("SELECT sync_status, last_sync_at FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(Some((
            status_from_row(&row)?,
            row.try_get::<Option<DateTime<Utc>>, _>("last_sync_at")?,
        ))),
        None => Ok(None),
    }
}

/// Write the status column; `last_sync_at` is only touched when provided.
#[instrument(skip_all)]
pub async fn set_sync_status(
    pool: &Pool,
    user_id: i64,
    status: SyncStatus,
    last_sync_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let res = sqlx::query(
        "UPDATE users SET sync_status = ?, last_sync_at = COALESCE(?, last_sync_at) WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(last_sync_at)
    .bind(user_id)
    .execute(pool)
    .await
    .with_context(|| format!("failed to set sync status for user {user_id}"))?;
    if res.rows_affected() == 0 {
        return Err(anyhow!("user {} not found", user_id));
    }
    Ok(())
}

pub(crate) async fn delete_user_posts_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
) -> Result<u64> {
    let res = sqlx::query("DELETE FROM cached_posts WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .context("failed to clear cached posts")?;
    Ok(res.rows_affected())
}

pub(crate) async fn insert_post_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    post: &Post,
    fetched_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO cached_posts \
         (user_id, post_urn, created_at_ms, text_preview, media_type, media_asset_urn, permalink, fetched_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&post.post_urn)
    .bind(post.created_at_ms)
    .bind(&post.text_preview)
    .bind(post.media_type.as_str())
    .bind(post.media_asset_urn.as_deref())
    .bind(&post.permalink)
    .bind(fetched_at)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to cache post {}", post.post_urn))?;
    Ok(())
}

/// Cached posts for a user, newest first.
#[instrument(skip_all)]
pub async fn list_cached_posts(pool: &Pool, user_id: i64) -> Result<Vec<CachedPost>> {
    let rows = sqlx::query(
        "SELECT user_id, post_urn, created_at_ms, text_preview, media_type, media_asset_urn, permalink, fetched_at \
         FROM cached_posts WHERE user_id = ? ORDER BY created_at_ms DESC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<CachedPost> {
            let media: String = row.get("media_type");
            let media_type = MediaType::parse_media_type(&media)
                .ok_or_else(|| anyhow!("unknown media type {media}"))?;
            Ok(CachedPost {
                user_id: row.get("user_id"),
                post: Post {
                    post_urn: row.get("post_urn"),
                    created_at_ms: row.get("created_at_ms"),
                    text_preview: row.get("text_preview"),
                    media_type,
                    media_asset_urn: row.try_get::<Option<String>, _>("media_asset_urn")?,
                    permalink: row.get("permalink"),
                },
                fetched_at: row.try_get("fetched_at")?,
            })
        })
        .collect()
}

#[instrument(skip_all)]
pub async fn post_stats(pool: &Pool, user_id: i64) -> Result<PostStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS cnt, MAX(created_at_ms) AS latest FROM cached_posts WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(PostStats {
        count: row.get("cnt"),
        latest_created_at_ms: row.try_get::<Option<i64>, _>("latest")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_run_summary(pool: &Pool, summary: &RunSummary) -> Result<i64> {
    let failures =
        serde_json::to_string(&summary.failures).context("failed to encode run failures")?;
    let rec = sqlx::query(
        "INSERT INTO sync_runs (run_id, started_at, total, successful, failed, batches, failures) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(summary.run_id.to_string())
    .bind(summary.timestamp)
    .bind(summary.total as i64)
    .bind(summary.successful as i64)
    .bind(summary.failed as i64)
    .bind(summary.batches as i64)
    .bind(failures)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn count_sync_runs(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_runs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
