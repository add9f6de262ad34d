use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use super::{StatsSnapshot, RECENT_SNAPSHOTS};
use crate::{auth::extractors::AdminUser, error::AppResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: Vec<StatsSnapshot>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/stats", get(get_stats))
}

#[instrument(skip_all)]
pub async fn get_stats(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<StatsResponse>> {
    let stats = state.stats.recent(RECENT_SNAPSHOTS).await?;
    Ok(Json(StatsResponse { success: true, stats }))
}
