use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::RegisterInput,
    password::{self, strength_problem},
    repo_types::{NewUser, Role, User},
    reset_token,
};
use crate::{
    error::{AppError, AppResult, StoreError},
    media::{AssetSlot, Upload},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn ensure_strong(plain: &str) -> AppResult<()> {
    match strength_problem(plain) {
        Some(msg) => Err(AppError::validation(msg)),
        None => Ok(()),
    }
}

async fn load_user(st: &AppState, id: Uuid) -> AppResult<User> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))
}

pub async fn register(st: &AppState, input: RegisterInput, avatar: Option<Upload>) -> AppResult<User> {
    let name = input.name.trim().to_string();
    let email = normalize_email(&input.email);
    if name.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(AppError::validation("Please enter all fields"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    ensure_strong(&input.password)?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let avatar = st.media.store(avatar, AssetSlot::Avatar).await;
    let new_user = NewUser {
        name,
        email,
        password_hash: password::hash_password(&input.password)?,
        avatar: avatar.clone(),
    };

    let user = match st.users.insert(new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict) => {
            // Lost a race against a concurrent registration.
            st.media.discard(&avatar, AssetSlot::Avatar).await;
            return Err(AppError::DuplicateEmail);
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(st: &AppState, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Please enter all fields"));
    }

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !password::verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub async fn change_password(st: &AppState, user_id: Uuid, old: &str, new: &str) -> AppResult<()> {
    if old.is_empty() || new.is_empty() {
        return Err(AppError::validation("Please enter all fields"));
    }
    let user = load_user(st, user_id).await?;
    if !password::verify_password(old, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }
    ensure_strong(new)?;

    let hash = password::hash_password(new)?;
    if !st.users.set_password_hash(user.id, &hash).await? {
        return Err(AppError::not_found("User does not exist"));
    }
    info!(user_id = %user.id, "password changed");
    Ok(())
}

pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    name: Option<String>,
    email: Option<String>,
) -> AppResult<User> {
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let email = email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty());
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(AppError::validation("Invalid email"));
        }
        if let Some(other) = st.users.find_by_email(email).await? {
            if other.id != user_id {
                return Err(AppError::DuplicateEmail);
            }
        }
    }

    let user = st
        .users
        .set_profile(user_id, name.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

/// Uploads the new avatar, then swaps it in. The replaced avatar is discarded
/// only after the swap; if the upload fails the current one is kept.
pub async fn update_profile_picture(st: &AppState, user_id: Uuid, file: Option<Upload>) -> AppResult<User> {
    let file = file.ok_or_else(|| AppError::validation("No file provided"))?;
    load_user(st, user_id).await?;

    let Some(avatar) = st.media.upload(file, AssetSlot::Avatar).await else {
        return load_user(st, user_id).await;
    };
    match st.users.set_avatar(user_id, &avatar).await? {
        Some((user, previous)) => {
            st.media.discard(&previous, AssetSlot::Avatar).await;
            info!(user_id = %user.id, "avatar updated");
            Ok(user)
        }
        None => {
            st.media.discard(&avatar, AssetSlot::Avatar).await;
            Err(AppError::not_found("User does not exist"))
        }
    }
}

/// Issues a reset token and mails the link. Returns the address it was sent to.
pub async fn forget_password(st: &AppState, email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Please enter your email"));
    }
    let user = st
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;

    let token = reset_token::generate(OffsetDateTime::now_utc());
    if !st
        .users
        .set_reset_token(user.id, &token.digest, token.expires_at)
        .await?
    {
        return Err(AppError::not_found("User does not exist"));
    }

    let url = format!(
        "{}/resetpassword/{}",
        st.config.frontend_url.trim_end_matches('/'),
        token.presented
    );
    let body = format!(
        "Click on the link to reset your password: {url}\n\nIf you have not requested this, please ignore this email."
    );
    st.mailer
        .send(&user.email, "SkillShare Reset Password", &body)
        .await
        .map_err(|e| {
            warn!(error = %e, user_id = %user.id, "reset email dispatch failed");
            AppError::UpstreamUnavailable("Could not send the reset email, please try again later".into())
        })?;

    info!(user_id = %user.id, "reset token issued");
    Ok(user.email)
}

/// Sets a new password through a mailed token. The token is consumed in the
/// same write that stores the new hash, so it authorises at most one reset.
pub async fn reset_password(st: &AppState, presented: &str, new_password: &str) -> AppResult<()> {
    let digest = reset_token::digest(presented);
    if st
        .users
        .find_by_reset_token(&digest, OffsetDateTime::now_utc())
        .await?
        .is_none()
    {
        return Err(AppError::TokenExpired);
    }

    if new_password.is_empty() {
        return Err(AppError::validation("Please enter a new password"));
    }
    ensure_strong(new_password)?;

    let hash = password::hash_password(new_password)?;
    let user = st
        .users
        .consume_reset_token(&digest, &hash, OffsetDateTime::now_utc())
        .await?
        .ok_or(AppError::TokenExpired)?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Removes an account after a best-effort avatar cleanup. Returns the removed user's name.
pub async fn delete_user(st: &AppState, user_id: Uuid) -> AppResult<String> {
    let user = load_user(st, user_id).await?;
    st.media.discard(&user.avatar, AssetSlot::Avatar).await;
    if !st.users.delete(user.id).await? {
        return Err(AppError::not_found("User does not exist"));
    }
    info!(user_id = %user.id, "user deleted");
    Ok(user.name)
}

pub async fn list_users(st: &AppState) -> AppResult<Vec<User>> {
    Ok(st.users.list_all().await?)
}

/// Flips the user between the two roles. Returns `(previous, current)`.
pub async fn change_role(st: &AppState, user_id: Uuid) -> AppResult<(Role, Role)> {
    let role = st
        .users
        .toggle_role(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User does not exist"))?;
    let prev = role.toggled();
    info!(user_id = %user_id, from = %prev, to = %role, "role changed");
    Ok((prev, role))
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::{
        courses::{dto::CreateCourseInput, services::create_course},
        playlist::services::add_to_playlist,
        test_support::{upload, TestApp},
    };
    use time::Duration;

    const PASSWORD: &str = "Str0ng!pass";

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            name: "Grace".into(),
            email: email.into(),
            password: PASSWORD.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[tokio::test]
    async fn register_twice_keeps_one_user() {
        let app = TestApp::new();
        register(&app.state, input("grace@example.com"), None).await.unwrap();
        let err = register(&app.state, input("Grace@Example.com "), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(app.users.len(), 1);
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let app = TestApp::new();
        let user = register(&app.state, input("h@example.com"), None).await.unwrap();
        assert_ne!(user.password_hash, PASSWORD);
        assert!(password::verify_password(PASSWORD, &user.password_hash).unwrap());
        assert_eq!(user.role, Role::User);
        assert!(!user.subscription.is_active());
    }

    #[tokio::test]
    async fn register_requires_all_fields_and_strong_password() {
        let app = TestApp::new();
        let mut missing = input("x@example.com");
        missing.name = "  ".into();
        assert!(matches!(
            register(&app.state, missing, None).await,
            Err(AppError::Validation(_))
        ));

        let mut weak = input("x@example.com");
        weak.password = "password".into();
        assert!(matches!(
            register(&app.state, weak, None).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(app.users.len(), 0);
    }

    #[tokio::test]
    async fn register_with_file_and_no_gateway_uses_placeholder() {
        let app = TestApp::new();
        let user = register(&app.state, input("p@example.com"), Some(upload("image/png")))
            .await
            .unwrap();
        assert_eq!(user.avatar, AssetSlot::Avatar.placeholder());
    }

    #[tokio::test]
    async fn register_with_gateway_stores_uploaded_avatar() {
        let app = TestApp::with_recording_gateway();
        let user = register(&app.state, input("p@example.com"), Some(upload("image/png")))
            .await
            .unwrap();
        assert!(user.avatar.id.starts_with("images/"));
        assert_eq!(app.gateway().upload_count(), 1);
    }

    #[tokio::test]
    async fn register_survives_failing_gateway() {
        let app = TestApp::with_failing_gateway();
        let user = register(&app.state, input("f@example.com"), Some(upload("image/png")))
            .await
            .unwrap();
        assert_eq!(user.avatar.id, "placeholder_avatar");
    }

    #[tokio::test]
    async fn login_errors_are_indistinguishable() {
        let app = TestApp::new();
        register(&app.state, input("l@example.com"), None).await.unwrap();

        let wrong_password = login(&app.state, "l@example.com", "Wrong!pass1").await.unwrap_err();
        let unknown_email = login(&app.state, "nobody@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.status_code(), unknown_email.status_code());

        let user = login(&app.state, " L@example.com", PASSWORD).await.unwrap();
        assert_eq!(user.email, "l@example.com");
    }

    #[tokio::test]
    async fn change_password_rehashes_and_checks_old() {
        let app = TestApp::new();
        let user = register(&app.state, input("c@example.com"), None).await.unwrap();

        let err = change_password(&app.state, user.id, "Wrong!pass1", "N3w!pass").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        change_password(&app.state, user.id, PASSWORD, "N3w!pass").await.unwrap();
        assert!(login(&app.state, "c@example.com", PASSWORD).await.is_err());
        assert!(login(&app.state, "c@example.com", "N3w!pass").await.is_ok());
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let app = TestApp::new();
        register(&app.state, input("r@example.com"), None).await.unwrap();

        let sent_to = forget_password(&app.state, "r@example.com").await.unwrap();
        assert_eq!(sent_to, "r@example.com");
        let token = app.mailer.last_reset_token().expect("reset link mailed");

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "r@example.com");
        assert_eq!(sent[0].subject, "SkillShare Reset Password");
        assert!(sent[0]
            .body
            .contains(&format!("http://localhost:3000/resetpassword/{token}")));

        let stored = app.users.get_by_email("r@example.com").unwrap();
        assert_ne!(stored.reset_password_token.as_deref(), Some(token.as_str()));

        reset_password(&app.state, &token, "Fresh!pass9").await.unwrap();
        assert!(login(&app.state, "r@example.com", "Fresh!pass9").await.is_ok());

        let stored = app.users.get_by_email("r@example.com").unwrap();
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expire.is_none());

        let replay = reset_password(&app.state, &token, "Other!pass9").await.unwrap_err();
        assert!(matches!(replay, AppError::TokenExpired));
    }

    #[tokio::test]
    async fn reset_token_expires_after_window() {
        let app = TestApp::new();
        register(&app.state, input("e@example.com"), None).await.unwrap();
        forget_password(&app.state, "e@example.com").await.unwrap();
        let token = app.mailer.last_reset_token().unwrap();

        let stored = app.users.get_by_email("e@example.com").unwrap();
        let digest = stored.reset_password_token.unwrap();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        assert!(app.state.users.set_reset_token(stored.id, &digest, past).await.unwrap());

        let err = reset_password(&app.state, &token, "Fresh!pass9").await.unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
        assert!(login(&app.state, "e@example.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_resets_with_one_token_succeed_once() {
        let app = TestApp::new();
        register(&app.state, input("twice@example.com"), None).await.unwrap();
        forget_password(&app.state, "twice@example.com").await.unwrap();
        let token = app.mailer.last_reset_token().unwrap();

        let (a, b) = tokio::join!(
            reset_password(&app.state, &token, "First!pass1"),
            reset_password(&app.state, &token, "Second!pass2"),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failed = if a.is_ok() { b } else { a };
        assert!(matches!(failed, Err(AppError::TokenExpired)));
    }

    #[tokio::test]
    async fn consumed_token_cannot_be_consumed_again() {
        let app = TestApp::new();
        register(&app.state, input("once@example.com"), None).await.unwrap();
        forget_password(&app.state, "once@example.com").await.unwrap();
        let token = app.mailer.last_reset_token().unwrap();
        let digest = reset_token::digest(&token);
        let now = OffsetDateTime::now_utc();

        let first = app.state.users.consume_reset_token(&digest, "hash-a", now).await.unwrap();
        let second = app.state.users.consume_reset_token(&digest, "hash-b", now).await.unwrap();
        assert_eq!(first.unwrap().password_hash, "hash-a");
        assert!(second.is_none());
        assert_eq!(app.users.get_by_email("once@example.com").unwrap().password_hash, "hash-a");
    }

    #[tokio::test]
    async fn slow_avatar_upload_keeps_concurrent_playlist_and_reset_token() {
        let app = TestApp::with_slow_gateway(StdDuration::from_millis(100));
        let user = register(&app.state, input("slow@example.com"), None).await.unwrap();
        let course = create_course(
            &app.state,
            CreateCourseInput {
                title: Some("Rust".into()),
                description: Some("Ownership and borrowing".into()),
                category: Some("Programming".into()),
                created_by: Some("Admin".into()),
            },
            None,
        )
        .await
        .unwrap();

        let (avatar, added, mailed) = tokio::join!(
            update_profile_picture(&app.state, user.id, Some(upload("image/png"))),
            add_to_playlist(&app.state, &user, course.id),
            forget_password(&app.state, "slow@example.com"),
        );
        let avatar = avatar.unwrap();
        added.unwrap();
        mailed.unwrap();

        let stored = app.users.get_by_email("slow@example.com").unwrap();
        assert_eq!(stored.avatar, avatar.avatar);
        assert!(stored.avatar.id.starts_with("images/"));
        assert!(stored.has_in_playlist(course.id));
        assert_eq!(stored.playlist.len(), 1);
        assert!(stored.reset_password_token.is_some());

        let token = app.mailer.last_reset_token().unwrap();
        reset_password(&app.state, &token, "Fresh!pass9").await.unwrap();
        assert!(login(&app.state, "slow@example.com", "Fresh!pass9").await.is_ok());
    }

    #[tokio::test]
    async fn slow_avatar_upload_does_not_undo_concurrent_reset() {
        let app = TestApp::with_slow_gateway(StdDuration::from_millis(100));
        let user = register(&app.state, input("undo@example.com"), None).await.unwrap();
        forget_password(&app.state, "undo@example.com").await.unwrap();
        let token = app.mailer.last_reset_token().unwrap();

        let (avatar, reset) = tokio::join!(
            update_profile_picture(&app.state, user.id, Some(upload("image/png"))),
            reset_password(&app.state, &token, "Fresh!pass9"),
        );
        avatar.unwrap();
        reset.unwrap();

        let stored = app.users.get_by_email("undo@example.com").unwrap();
        assert!(stored.reset_password_token.is_none());
        assert!(stored.reset_password_expire.is_none());
        assert!(login(&app.state, "undo@example.com", "Fresh!pass9").await.is_ok());
        assert!(login(&app.state, "undo@example.com", PASSWORD).await.is_err());

        let replay = reset_password(&app.state, &token, "Other!pass9").await.unwrap_err();
        assert!(matches!(replay, AppError::TokenExpired));
    }

    #[tokio::test]
    async fn forget_password_for_unknown_email_is_not_found() {
        let app = TestApp::new();
        let err = forget_password(&app.state, "ghost@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn forget_password_propagates_mail_failure() {
        let app = TestApp::new();
        register(&app.state, input("m@example.com"), None).await.unwrap();
        app.mailer.fail_next();
        let err = forget_password(&app.state, "m@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn update_profile_is_partial_and_rejects_taken_email() {
        let app = TestApp::new();
        let a = register(&app.state, input("a@example.com"), None).await.unwrap();
        register(&app.state, input("b@example.com"), None).await.unwrap();

        let updated = update_profile(&app.state, a.id, Some("Ada".into()), None).await.unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.email, "a@example.com");

        let err = update_profile(&app.state, a.id, None, Some("b@example.com".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_profile_picture_replaces_avatar() {
        let app = TestApp::with_recording_gateway();
        let user = register(&app.state, input("pic@example.com"), Some(upload("image/png")))
            .await
            .unwrap();
        let old = user.avatar.clone();

        let updated = update_profile_picture(&app.state, user.id, Some(upload("image/jpeg")))
            .await
            .unwrap();
        assert_ne!(updated.avatar, old);
        assert_eq!(app.gateway().destroyed(), vec![old.id]);

        let err = update_profile_picture(&app.state, user.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_avatar_upload_keeps_current_avatar() {
        let app = TestApp::with_failing_gateway();
        let user = register(&app.state, input("keep@example.com"), None).await.unwrap();
        let updated = update_profile_picture(&app.state, user.id, Some(upload("image/png")))
            .await
            .unwrap();
        assert_eq!(updated.avatar, user.avatar);

        let err = update_profile_picture(&app.state, Uuid::new_v4(), Some(upload("image/png")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_user_cleans_up_avatar() {
        let app = TestApp::with_recording_gateway();
        let user = register(&app.state, input("d@example.com"), Some(upload("image/png")))
            .await
            .unwrap();
        let name = delete_user(&app.state, user.id).await.unwrap();
        assert_eq!(name, "Grace");
        assert_eq!(app.users.len(), 0);
        assert_eq!(app.gateway().destroyed(), vec![user.avatar.id]);

        let err = delete_user(&app.state, user.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn change_role_toggles() {
        let app = TestApp::new();
        let user = register(&app.state, input("role@example.com"), None).await.unwrap();
        assert_eq!(change_role(&app.state, user.id).await.unwrap(), (Role::User, Role::Admin));
        assert_eq!(change_role(&app.state, user.id).await.unwrap(), (Role::Admin, Role::User));
        assert!(matches!(
            change_role(&app.state, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
