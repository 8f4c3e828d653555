//! Periodic member-snapshot sync: pulls each user's recent activity from the
//! provider, normalizes it into posts and fully replaces the user's cache.

pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod snapshot;
pub mod status;

pub use engine::{Pacer, SyncEngine, SyncOptions, TokioPacer};
pub use error::{FetchError, SyncError};
