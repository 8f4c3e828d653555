//! Batch orchestrator: selects users with a sync token and drives the
//! fetch -> normalize -> cache pipeline for each of them.
//!
//! Users run concurrently inside a batch; batches run one after another with
//! a courtesy pause in between so the provider's rate limits are respected.
//! A failing user never aborts its batch or the run; every outcome is folded
//! into the [`RunSummary`].
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache;
use crate::db::{self, Pool, SyncCandidate};
use crate::error::SyncError;
use crate::model::{RunSummary, SyncFailure, SyncStatus, SyncStatusView, UserSyncResult};
use crate::snapshot::{fetch_recent_posts, SnapshotService};
use crate::status;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_POST_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub post_limit: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            post_limit: DEFAULT_POST_LIMIT,
        }
    }
}

/// Number of batches needed for `total` users.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    let size = batch_size.max(1);
    (total + size - 1) / size
}

/// Waits out the courtesy delay between batches.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    pool: Pool,
    snapshot: Arc<dyn SnapshotService>,
    pacer: Arc<dyn Pacer>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(pool: Pool, snapshot: Arc<dyn SnapshotService>, mut options: SyncOptions) -> Self {
        options.batch_size = options.batch_size.max(1);
        Self {
            pool,
            snapshot,
            pacer: Arc::new(TokioPacer),
            options,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync every user holding a token. Only failing to list users fails the
    /// run; per-user errors end up in the summary.
    #[instrument(skip_all)]
    pub async fn run_scheduled_sync(&self) -> Result<RunSummary, SyncError> {
        let timestamp = Utc::now();
        let users = db::list_sync_candidates(&self.pool).await?;
        let batch_size = self.options.batch_size;
        let batches = batch_count(users.len(), batch_size);
        info!(users = users.len(), batch_size, batches, "starting scheduled sync");

        let mut outcomes = Vec::with_capacity(users.len());
        for (index, chunk) in users.chunks(batch_size).enumerate() {
            if index > 0 {
                info!(
                    delay_ms = self.options.batch_delay.as_millis() as u64,
                    "pausing before next batch"
                );
                self.pacer.pause(self.options.batch_delay).await;
            }
            outcomes.extend(self.run_batch(index, chunk).await);
        }

        let summary = summarize(timestamp, batches, outcomes);
        info!(
            run_id = %summary.run_id,
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "scheduled sync finished"
        );

        if let Err(err) = db::insert_run_summary(&self.pool, &summary).await {
            error!(?err, run_id = %summary.run_id, "failed to persist run summary");
        }
        Ok(summary)
    }

    /// Sync one user on demand (login or manual trigger).
    #[instrument(skip(self))]
    pub async fn run_user_sync(&self, user_id: i64) -> Result<UserSyncResult, SyncError> {
        let user = db::get_user(&self.pool, user_id)
            .await?
            .ok_or(SyncError::UserNotFound(user_id))?;
        let token = user.dma_token.ok_or(SyncError::MissingToken(user_id))?;

        let posts_processed = self.sync_user(user_id, &token).await?;
        Ok(UserSyncResult {
            posts_processed,
            status: SyncStatus::Success,
        })
    }

    pub async fn sync_status(&self, user_id: i64) -> Result<SyncStatusView, SyncError> {
        status::sync_status(&self.pool, user_id)
            .await?
            .ok_or(SyncError::UserNotFound(user_id))
    }

    /// Run a batch to completion: one task per user, all joined before
    /// returning. A panicking task is reported as that user's failure.
    #[instrument(skip(self, users), fields(size = users.len()))]
    async fn run_batch(
        &self,
        batch: usize,
        users: &[SyncCandidate],
    ) -> Vec<(SyncCandidate, Result<usize, SyncError>)> {
        let handles = users.iter().map(|user| {
            let engine = self.clone();
            let user_id = user.id;
            let token = user.token.clone();
            tokio::spawn(async move { engine.sync_user(user_id, &token).await })
        });

        let joined = join_all(handles).await;
        let mut outcomes = Vec::with_capacity(users.len());
        for (result, user) in joined.into_iter().zip(users.iter().cloned()) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(user_id = user.id, error = %err, "user sync task aborted");
                    if let Err(mark_err) = status::mark_failed(&self.pool, user.id).await {
                        error!(?mark_err, user_id = user.id, "failed to record sync failure");
                    }
                    Err(SyncError::Task(err.to_string()))
                }
            };
            outcomes.push((user, outcome));
        }
        outcomes
    }

    /// The per-user pipeline. On error the user is marked failed and the
    /// previous cache is left untouched.
    #[instrument(skip(self, token))]
    async fn sync_user(&self, user_id: i64, token: &str) -> Result<usize, SyncError> {
        let outcome = self.fetch_and_cache(user_id, token).await;
        match &outcome {
            Ok(posts) => info!(user_id, posts, "user sync succeeded"),
            Err(err) => {
                warn!(user_id, error = %err, "user sync failed");
                if let Err(mark_err) = status::mark_failed(&self.pool, user_id).await {
                    error!(?mark_err, user_id, "failed to record sync failure");
                }
            }
        }
        outcome
    }

    async fn fetch_and_cache(&self, user_id: i64, token: &str) -> Result<usize, SyncError> {
        status::mark_syncing(&self.pool, user_id).await?;
        let fetched_at = Utc::now();
        let posts = fetch_recent_posts(
            self.snapshot.as_ref(),
            token,
            self.options.post_limit,
            fetched_at,
        )
        .await?;
        let cached = cache::replace_user_posts(&self.pool, user_id, &posts, fetched_at).await?;
        status::mark_success(&self.pool, user_id, Utc::now()).await?;
        Ok(cached)
    }
}

fn summarize(
    timestamp: chrono::DateTime<Utc>,
    batches: usize,
    outcomes: Vec<(SyncCandidate, Result<usize, SyncError>)>,
) -> RunSummary {
    let total = outcomes.len();
    let failures: Vec<SyncFailure> = outcomes
        .into_iter()
        .filter_map(|(user, outcome)| {
            outcome.err().map(|err| SyncFailure {
                user_id: user.id,
                name: user.name,
                error: err.to_string(),
            })
        })
        .collect();

    RunSummary {
        run_id: Uuid::new_v4(),
        timestamp,
        total,
        successful: total - failures.len(),
        failed: failures.len(),
        batches,
        failures,
    }
}
