//! Database module: view models and SQL repositories.
//!
//! - `model`: slices returned by queries.
//! - `repo`: SQL-only functions that map rows into domain types.
//!
//! Callers import from `activity_sync::db`; the repository API is re-exported
//! here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{PostStats, SyncCandidate};
