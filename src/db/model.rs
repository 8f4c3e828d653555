//! View models returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

/// User slice the orchestrator needs to run one pipeline.
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    pub id: i64,
    pub name: String,
    pub token: String,
}

/// Aggregate over a user's cached posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostStats {
    pub count: i64,
    pub latest_created_at_ms: Option<i64>,
}
