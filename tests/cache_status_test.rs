use activity_sync::cache::replace_user_posts;
use activity_sync::db;
use activity_sync::model::{MediaType, Post, SyncStatus};
use activity_sync::status;
use chrono::{Duration, TimeZone, Utc};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn post(id: u32, created_at_ms: i64) -> Post {
    Post {
        post_urn: format!("urn:li:activity:{id}"),
        created_at_ms,
        text_preview: format!("post {id}"),
        media_type: if id % 2 == 0 {
            MediaType::Image
        } else {
            MediaType::None
        },
        media_asset_urn: (id % 2 == 0).then(|| format!("https://cdn.example/{id}.jpg")),
        permalink: format!("https://www.linkedin.com/feed/update/activity-{id}"),
    }
}

#[tokio::test]
async fn replace_discards_previous_rows() {
    let pool = setup_pool().await;
    let uid = db::create_user(&pool, "Ada", Some("tok")).await.unwrap();
    let first_fetch = Utc::now() - Duration::hours(1);

    let n = replace_user_posts(&pool, uid, &[post(1, 1_000), post(2, 2_000)], first_fetch)
        .await
        .unwrap();
    assert_eq!(n, 2);

    let second_fetch = Utc::now();
    replace_user_posts(&pool, uid, &[post(3, 3_000)], second_fetch)
        .await
        .unwrap();

    let cached = db::list_cached_posts(&pool, uid).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].post, post(3, 3_000));
    assert_eq!(cached[0].fetched_at.timestamp(), second_fetch.timestamp());
}

#[tokio::test]
async fn empty_replace_leaves_empty_cache() {
    let pool = setup_pool().await;
    let uid = db::create_user(&pool, "Ada", Some("tok")).await.unwrap();
    replace_user_posts(&pool, uid, &[post(1, 1_000)], Utc::now())
        .await
        .unwrap();

    let n = replace_user_posts(&pool, uid, &[], Utc::now()).await.unwrap();
    assert_eq!(n, 0);
    assert!(db::list_cached_posts(&pool, uid).await.unwrap().is_empty());
}

#[tokio::test]
async fn replace_only_touches_the_given_user() {
    let pool = setup_pool().await;
    let a = db::create_user(&pool, "Ada", Some("tok-a")).await.unwrap();
    let b = db::create_user(&pool, "Bob", Some("tok-b")).await.unwrap();
    replace_user_posts(&pool, a, &[post(1, 1_000)], Utc::now())
        .await
        .unwrap();
    replace_user_posts(&pool, b, &[post(2, 2_000), post(4, 4_000)], Utc::now())
        .await
        .unwrap();
    replace_user_posts(&pool, a, &[], Utc::now()).await.unwrap();

    assert!(db::list_cached_posts(&pool, a).await.unwrap().is_empty());
    let urns: Vec<String> = db::list_cached_posts(&pool, b)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.post.post_urn)
        .collect();
    assert_eq!(urns, vec!["urn:li:activity:4", "urn:li:activity:2"]);
}

#[tokio::test]
async fn status_tracks_lifecycle() {
    let pool = setup_pool().await;
    let uid = db::create_user(&pool, "Ada", Some("tok")).await.unwrap();

    let view = status::sync_status(&pool, uid).await.unwrap().unwrap();
    assert_eq!(view.status, SyncStatus::Pending);
    assert!(view.last_sync_at.is_none());
    assert_eq!(view.posts_count, 0);

    status::mark_syncing(&pool, uid).await.unwrap();
    assert_eq!(
        status::sync_status(&pool, uid).await.unwrap().unwrap().status,
        SyncStatus::Syncing
    );

    let synced_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    replace_user_posts(&pool, uid, &[post(1, 1_717_243_200_000)], synced_at)
        .await
        .unwrap();
    status::mark_success(&pool, uid, synced_at).await.unwrap();

    let view = status::sync_status(&pool, uid).await.unwrap().unwrap();
    assert_eq!(view.status, SyncStatus::Success);
    assert_eq!(view.last_sync_at, Some(synced_at));
    assert_eq!(view.posts_count, 1);
    assert_eq!(
        view.latest_post_date.map(|d| d.timestamp_millis()),
        Some(1_717_243_200_000)
    );

    status::mark_syncing(&pool, uid).await.unwrap();
    status::mark_failed(&pool, uid).await.unwrap();
    let view = status::sync_status(&pool, uid).await.unwrap().unwrap();
    assert_eq!(view.status, SyncStatus::Failed);
    assert_eq!(view.last_sync_at, Some(synced_at));

    assert!(status::sync_status(&pool, 9999).await.unwrap().is_none());
}
