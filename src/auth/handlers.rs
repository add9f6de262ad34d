use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        cookie::SessionCookie,
        dto::{
            AuthResponse, ChangePasswordRequest, ForgetPasswordRequest, LoginRequest, MessageResponse,
            RegisterInput, ResetPasswordRequest, UpdateProfileRequest, UserResponse, UsersResponse,
        },
        extractors::{AdminUser, CurrentUser},
        jwt::JwtKeys,
        repo_types::User,
        services,
    },
    error::AppResult,
    state::AppState,
    upload::MultipartForm,
};

const IMAGE_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgetpassword", post(forget_password))
        .route("/resetpassword/:token", put(reset_password))
        .layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).delete(delete_me))
        .route("/changepassword", put(change_password))
        .route("/updateprofile", put(update_profile))
        .route("/updateprofilepicture", put(update_profile_picture))
        .layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(get_all_users))
        .route("/admin/user/:id", put(change_user_role).delete(delete_user))
}

/// Signs a session for `user`, sets the cookie and echoes the token outside production.
fn session_response(state: &AppState, user: User, message: String, status: StatusCode) -> AppResult<Response> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    let cookie = SessionCookie::for_config(&state.config);
    let body = AuthResponse {
        success: true,
        message,
        user,
        token: (!state.config.production).then(|| token.clone()),
    };
    Ok((status, [(SET_COOKIE, cookie.issue_header(&token))], Json(body)).into_response())
}

#[instrument(skip(state, mp))]
pub async fn register(State(state): State<AppState>, mp: Multipart) -> AppResult<Response> {
    let form = MultipartForm::read(mp).await?;
    let input = RegisterInput {
        name: form.text("name").unwrap_or_default(),
        email: form.text("email").unwrap_or_default(),
        password: form.raw("password"),
    };
    let user = services::register(&state, input, form.file).await?;
    session_response(&state, user, "Registered successfully".into(), StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> AppResult<Response> {
    let user = services::login(&state, &payload.email, &payload.password).await?;
    let message = format!("Welcome back, {}", user.name);
    session_response(&state, user, message, StatusCode::OK)
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = SessionCookie::for_config(&state.config);
    (
        [(SET_COOKIE, cookie.clear_header())],
        Json(MessageResponse::ok("Logged out successfully")),
    )
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse { success: true, user })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Response> {
    let name = services::delete_user(&state, user.id).await?;
    let cookie = SessionCookie::for_config(&state.config);
    Ok((
        [(SET_COOKIE, cookie.clear_header())],
        Json(MessageResponse::ok(format!("User {name} deleted successfully"))),
    )
        .into_response())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::change_password(&state, user.id, &payload.old_password, &payload.new_password).await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::update_profile(&state, user.id, payload.name, payload.email).await?;
    Ok(Json(MessageResponse::ok("Profile updated successfully")))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> AppResult<Json<MessageResponse>> {
    let form = MultipartForm::read(mp).await?;
    services::update_profile_picture(&state, user.id, form.file).await?;
    Ok(Json(MessageResponse::ok("Profile picture updated successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let sent_to = services::forget_password(&state, &payload.email).await?;
    Ok(Json(MessageResponse::ok(format!("Reset token has been sent to {sent_to}"))))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::reset_password(&state, &token, &payload.password).await?;
    Ok(Json(MessageResponse::ok("Password reset successfully")))
}

#[instrument(skip_all)]
pub async fn get_all_users(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<UsersResponse>> {
    let users = services::list_users(&state).await?;
    Ok(Json(UsersResponse { success: true, users }))
}

#[instrument(skip(state, _admin))]
pub async fn change_user_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let (prev, new) = services::change_role(&state, id).await?;
    Ok(Json(MessageResponse::ok(format!("Role updated from {prev} to {new}"))))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let name = services::delete_user(&state, id).await?;
    Ok(Json(MessageResponse::ok(format!("User {name} deleted successfully"))))
}
