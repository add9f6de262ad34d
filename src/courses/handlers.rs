use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AddLectureInput, CourseQuery, CourseResponse, CoursesResponse, CreateCourseInput, LectureQuery, LecturesResponse},
    services,
};
use crate::{
    auth::{
        dto::MessageResponse,
        extractors::{AdminUser, CurrentUser},
    },
    error::AppResult,
    state::AppState,
    upload::MultipartForm,
};

const POSTER_BODY_LIMIT: usize = 10 * 1024 * 1024;
const VIDEO_BODY_LIMIT: usize = 100 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(get_all_courses))
        .route(
            "/createcourse",
            post(create_course).layer(DefaultBodyLimit::max(POSTER_BODY_LIMIT)),
        )
        .route(
            "/course/:id",
            get(get_course_lectures)
                .post(add_lecture)
                .layer(DefaultBodyLimit::max(VIDEO_BODY_LIMIT))
                .delete(delete_course),
        )
        .route("/lecture", delete(delete_lecture))
}

#[instrument(skip(state))]
pub async fn get_all_courses(
    State(state): State<AppState>,
    Query(q): Query<CourseQuery>,
) -> AppResult<Json<CoursesResponse>> {
    let courses = services::list_courses(&state, &q.keyword, &q.category).await?;
    Ok(Json(CoursesResponse { success: true, courses }))
}

#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<CourseResponse>)> {
    let form = MultipartForm::read(mp).await?;
    let input = CreateCourseInput {
        title: form.text("title"),
        description: form.text("description"),
        category: form.text("category"),
        created_by: form.text("createdBy"),
    };
    let course = services::create_course(&state, input, form.file).await?;
    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            success: true,
            message: "Course created successfully. You can add lectures now.".into(),
            course,
        }),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id, course_id = %id))]
pub async fn get_course_lectures(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LecturesResponse>> {
    let lectures = services::get_lectures(&state, id).await?;
    Ok(Json(LecturesResponse { success: true, lectures }))
}

#[instrument(skip(state, _admin, mp))]
pub async fn add_lecture(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> AppResult<Json<CourseResponse>> {
    let form = MultipartForm::read(mp).await?;
    let input = AddLectureInput {
        title: form.text("title"),
        description: form.text("description"),
    };
    let course = services::add_lecture(&state, id, input, form.file).await?;
    Ok(Json(CourseResponse {
        success: true,
        message: "Lecture added successfully".into(),
        course,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn delete_course(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_course(&state, id).await?;
    Ok(Json(MessageResponse::ok("Course deleted successfully")))
}

#[instrument(skip(state, _admin))]
pub async fn delete_lecture(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<LectureQuery>,
) -> AppResult<Json<MessageResponse>> {
    services::remove_lecture(&state, q.course_id, q.lecture_id).await?;
    Ok(Json(MessageResponse::ok("Lecture deleted successfully")))
}
