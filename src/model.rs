use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncStatus::Pending),
            "syncing" => Some(SyncStatus::Syncing),
            "success" => Some(SyncStatus::Success),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    /// `pending -> syncing -> {success | failed}`; a terminal state only
    /// leaves through the start of the next run.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        matches!(
            (self, next),
            (SyncStatus::Pending, SyncStatus::Syncing)
                | (SyncStatus::Success, SyncStatus::Syncing)
                | (SyncStatus::Failed, SyncStatus::Syncing)
                | (SyncStatus::Syncing, SyncStatus::Success)
                | (SyncStatus::Syncing, SyncStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    None,
    Image,
    Video,
    UrnReference,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::None => "NONE",
            MediaType::Image => "IMAGE",
            MediaType::Video => "VIDEO",
            MediaType::UrnReference => "URN_REFERENCE",
        }
    }

    pub fn parse_media_type(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(MediaType::None),
            "IMAGE" => Some(MediaType::Image),
            "VIDEO" => Some(MediaType::Video),
            "URN_REFERENCE" => Some(MediaType::UrnReference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub dma_token: Option<String>,
    pub sync_status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// A canonical post produced by the normalizer, before it is cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub post_urn: String,
    pub created_at_ms: i64,
    pub text_preview: String,
    pub media_type: MediaType,
    pub media_asset_urn: Option<String>,
    pub permalink: String,
}

/// A post as stored in a user's cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPost {
    pub user_id: i64,
    pub post: Post,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncFailure {
    pub user_id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of one orchestration run. Built once, persisted, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub batches: usize,
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSyncResult {
    pub posts_processed: usize,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStatusView {
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub posts_count: i64,
    pub latest_post_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            SyncStatus::Pending,
            SyncStatus::Syncing,
            SyncStatus::Success,
            SyncStatus::Failed,
        ] {
            assert_eq!(SyncStatus::parse_status(s.as_str()), Some(s));
        }
        assert_eq!(SyncStatus::parse_status("PENDING"), None);
    }

    #[test]
    fn status_machine_transitions() {
        assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Syncing));
        assert!(SyncStatus::Syncing.can_transition_to(SyncStatus::Success));
        assert!(SyncStatus::Syncing.can_transition_to(SyncStatus::Failed));
        assert!(SyncStatus::Failed.can_transition_to(SyncStatus::Syncing));
        assert!(!SyncStatus::Pending.can_transition_to(SyncStatus::Success));
        assert!(!SyncStatus::Success.can_transition_to(SyncStatus::Pending));
        assert!(!SyncStatus::Syncing.can_transition_to(SyncStatus::Syncing));
    }

    #[test]
    fn media_type_serializes_upper_snake() {
        let json = serde_json::to_string(&MediaType::UrnReference).unwrap();
        assert_eq!(json, "\"URN_REFERENCE\"");
        assert_eq!(
            MediaType::parse_media_type(MediaType::Video.as_str()),
            Some(MediaType::Video)
        );
    }
}
