//! Member snapshot API client and the per-user fetch step.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::model::Post;
use crate::normalize::normalize_record;
use crate::snapshot::model::SnapshotResponse;

pub mod model;

const SNAPSHOT_PATH: &str = "rest/memberSnapshotData";
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Source of raw snapshot records for one member token.
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Fetch up to `count` raw records. A missing snapshot is an empty list.
    async fn fetch_raw(&self, token: &str, count: usize) -> Result<Vec<Value>, FetchError>;
}

#[derive(Clone)]
pub struct SnapshotClient {
    http: Client,
    endpoint: Url,
    version: String,
    domain: String,
}

impl fmt::Debug for SnapshotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotClient")
            .field("endpoint", &self.endpoint)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl SnapshotClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.snapshot.base_url).context("invalid snapshot base URL")?;
        Self::with_base_url(
            base_url,
            cfg.snapshot.version.clone(),
            cfg.snapshot.domain.clone(),
        )
    }

    /// The base URL is treated as a directory: `https://host/v2` and
    /// `https://host/v2/` both resolve to `https://host/v2/rest/...`.
    pub fn with_base_url(mut base_url: Url, version: String, domain: String) -> Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let endpoint = base_url
            .join(SNAPSHOT_PATH)
            .with_context(|| format!("cannot resolve snapshot endpoint against {base_url}"))?;
        let http = Client::builder()
            .user_agent(concat!("activity-sync/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            version,
            domain,
        })
    }

    pub fn build_request(&self, token: &str, count: usize) -> Result<reqwest::Request, FetchError> {
        let count = count.to_string();
        let request = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("q", "criteria"),
                ("domain", self.domain.as_str()),
                ("count", count.as_str()),
            ])
            .bearer_auth(token)
            .header("LinkedIn-Version", &self.version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl SnapshotService for SnapshotClient {
    async fn fetch_raw(&self, token: &str, count: usize) -> Result<Vec<Value>, FetchError> {
        let request = self.build_request(token, count)?;
        debug!(url = %request.url(), "requesting member snapshot");

        let res = self.http.execute(request).await?;
        let status = res.status();

        if status == StatusCode::NOT_FOUND {
            info!("no snapshot data for member");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "snapshot API error");
            return Err(FetchError::Status { status, body });
        }

        let body = res.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let payload: SnapshotResponse = serde_json::from_str(&body)?;
        Ok(payload.into_records())
    }
}

/// Fetch, normalize and rank a member's most recent posts.
///
/// Asks the provider for twice `limit` records so dropped entries (no
/// permalink) still leave enough posts, then keeps the newest `limit`.
#[instrument(skip_all, fields(limit = limit))]
pub async fn fetch_recent_posts(
    service: &dyn SnapshotService,
    token: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Post>, FetchError> {
    let raw = service.fetch_raw(token, limit.saturating_mul(2)).await?;
    let fetched = raw.len();

    let mut posts: Vec<Post> = raw
        .iter()
        .enumerate()
        .filter_map(|(index, record)| normalize_record(record, index, now))
        .collect();
    posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
    posts.truncate(limit);

    debug!(fetched, kept = posts.len(), "normalized snapshot records");
    Ok(posts)
}
