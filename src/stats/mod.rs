//! Aggregate user statistics, recomputed off the request path.

use crate::state::AppState;
use axum::Router;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

pub mod handlers;
pub mod repo;
pub mod tracked;
pub mod worker;

pub use repo::{PgStatsRepo, StatsRepo};
pub use tracked::TrackedUsers;
pub use worker::{spawn_stats_worker, StatsTrigger};

/// Number of snapshots returned by the admin endpoint.
pub const RECENT_SNAPSHOTS: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct StatsSnapshot {
    pub users: i64,
    pub subscriptions: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    handlers::routes()
}
