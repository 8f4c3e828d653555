//! Full-replace writer for a user's cached posts.
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::db::{self, Pool};
use crate::model::Post;

/// Replace every cached post of `user_id` with `posts`.
///
/// Delete and insert share one transaction, so concurrent readers see either
/// the old cache or the new one. An empty `posts` leaves an empty cache.
#[instrument(skip_all, fields(user_id = user_id, posts = posts.len()))]
pub async fn replace_user_posts(
    pool: &Pool,
    user_id: i64,
    posts: &[Post],
    fetched_at: DateTime<Utc>,
) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let removed = db::delete_user_posts_tx(&mut tx, user_id).await?;
    for post in posts {
        db::insert_post_tx(&mut tx, user_id, post, fetched_at).await?;
    }
    tx.commit().await?;
    debug!(removed, inserted = posts.len(), "replaced cached posts");
    Ok(posts.len())
}
