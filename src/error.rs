//! Error types surfaced by the sync engine.
use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the provider's snapshot endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("snapshot API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to reach snapshot API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid snapshot response JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("user {0} has no sync token")]
    MissingToken(i64),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("datastore error: {0:#}")]
    Store(#[from] anyhow::Error),
    #[error("sync task aborted: {0}")]
    Task(String),
}
