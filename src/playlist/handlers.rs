use axum::{
    extract::{Query, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::services;
use crate::{
    auth::{dto::MessageResponse, extractors::CurrentUser},
    error::AppResult,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PlaylistRequest {
    pub id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addtoplaylist", post(add_to_playlist))
        .route("/removefromplaylist", delete(remove_from_playlist))
}

#[instrument(skip_all, fields(user_id = %user.id, course_id = %payload.id))]
pub async fn add_to_playlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PlaylistRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::add_to_playlist(&state, &user, payload.id).await?;
    Ok(Json(MessageResponse::ok("Added to playlist")))
}

#[instrument(skip_all, fields(user_id = %user.id, course_id = %q.id))]
pub async fn remove_from_playlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<PlaylistRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::remove_from_playlist(&state, &user, q.id).await?;
    Ok(Json(MessageResponse::ok("Removed from playlist")))
}
