use tracing::info;
use uuid::Uuid;

use crate::{
    auth::repo_types::{PlaylistEntry, User},
    courses::repo_types::Course,
    error::{AppError, AppResult},
    state::AppState,
};

async fn load_course(st: &AppState, course_id: Uuid) -> AppResult<Course> {
    st.courses
        .find(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Invalid course id"))
}

/// Adds a course with a snapshot of its current poster URL.
pub async fn add_to_playlist(st: &AppState, user: &User, course_id: Uuid) -> AppResult<()> {
    let course = load_course(st, course_id).await?;
    if user.has_in_playlist(course.id) {
        return Err(AppError::DuplicateEntry("Course already in playlist".into()));
    }

    let entry = PlaylistEntry {
        course: course.id,
        poster: course.poster.url,
    };
    if !st.users.add_playlist_entry(user.id, &entry).await? {
        return Err(AppError::DuplicateEntry("Course already in playlist".into()));
    }
    info!(user_id = %user.id, course_id = %course.id, "added to playlist");
    Ok(())
}

/// Removing a course that is not in the playlist succeeds.
pub async fn remove_from_playlist(st: &AppState, user: &User, course_id: Uuid) -> AppResult<()> {
    let course = load_course(st, course_id).await?;
    st.users.remove_playlist_entry(user.id, course.id).await?;
    info!(user_id = %user.id, course_id = %course.id, "removed from playlist");
    Ok(())
}
