use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{cookie::extract_cookie, cookie::SESSION_COOKIE, jwt::JwtKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// The authenticated user, resolved from the session cookie
/// (or an `Authorization: Bearer` header).
pub struct CurrentUser(pub User);

/// An authenticated user holding the admin role.
pub struct AdminUser(pub User);

fn session_token(parts: &Parts) -> Option<String> {
    extract_cookie(&parts.headers, SESSION_COOKIE).or_else(|| {
        parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::to_owned)
    })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| AppError::unauthorized("Please login to access this resource"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired session token");
            AppError::unauthorized("Invalid or expired session")
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("Please login to access this resource"))?;

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!(user_id = %user.id, role = %user.role, "admin route denied");
            return Err(AppError::Forbidden(format!(
                "{} is not allowed to access this resource",
                user.role
            )));
        }
        Ok(AdminUser(user))
    }
}
