use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{AvatarSwapRow, NewUser, PlaylistEntry, Role, User, UserRow};
use crate::error::StoreError;
use crate::media::Asset;

/// Persistence for user accounts.
///
/// Every write touches only the columns it owns, so writes made while a
/// request is waiting on I/O are never overwritten by an older snapshot.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// User holding `digest` whose reset window is still open at `now`.
    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>>;
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;
    /// Fails with [`StoreError::Conflict`] if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Updates the given fields, leaving `None` ones untouched. Fails with
    /// [`StoreError::Conflict`] if the email is taken.
    async fn set_profile(&self, id: Uuid, name: Option<&str>, email: Option<&str>)
        -> Result<Option<User>, StoreError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<bool>;
    /// Returns the updated user and the avatar that was replaced.
    async fn set_avatar(&self, id: Uuid, avatar: &Asset) -> anyhow::Result<Option<(User, Asset)>>;
    /// Flips the role in place and returns the new one.
    async fn toggle_role(&self, id: Uuid) -> anyhow::Result<Option<Role>>;
    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<bool>;
    /// Stores `password_hash` and clears the reset token in one step, if `digest`
    /// is still valid at `now`. A token can be consumed at most once.
    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` if the course is already in the playlist.
    async fn add_playlist_entry(&self, user_id: Uuid, entry: &PlaylistEntry) -> anyhow::Result<bool>;
    async fn remove_playlist_entry(&self, user_id: Uuid, course_id: Uuid) -> anyhow::Result<()>;
    async fn count(&self) -> anyhow::Result<i64>;
    async fn count_active_subscriptions(&self) -> anyhow::Result<i64>;
}

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, subscription_id, subscription_status,
    avatar_id, avatar_url, playlist, reset_password_token, reset_password_expire, created_at
"#;

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_password_token = $1 AND reset_password_expire > $2"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(digest)
            .bind(now)
            .fetch_optional(&self.db)
            .await
            .context("find user by reset token")?;
        row.map(User::try_from).transpose()
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        // ON CONFLICT closes the gap left by the caller's read-then-write check.
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, avatar_id, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.avatar.id)
            .bind(&user.avatar.url)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(row) => Ok(User::try_from(row)?),
            None => Err(StoreError::Conflict),
        }
    }

    async fn set_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(name)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("set password hash")?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_avatar(&self, id: Uuid, avatar: &Asset) -> anyhow::Result<Option<(User, Asset)>> {
        let sql = format!(
            r#"
            UPDATE users
               SET avatar_id = $2, avatar_url = $3
              FROM (SELECT id AS old_id, avatar_id AS old_avatar_id, avatar_url AS old_avatar_url
                      FROM users WHERE id = $1 FOR UPDATE) old
             WHERE id = old.old_id
            RETURNING {USER_COLUMNS}, old.old_avatar_id, old.old_avatar_url
            "#
        );
        let row = sqlx::query_as::<_, AvatarSwapRow>(&sql)
            .bind(id)
            .bind(&avatar.id)
            .bind(&avatar.url)
            .fetch_optional(&self.db)
            .await
            .context("set avatar")?;
        row.map(|r| {
            let previous = Asset::new(r.old_avatar_id, r.old_avatar_url);
            Ok((User::try_from(r.user)?, previous))
        })
        .transpose()
    }

    async fn toggle_role(&self, id: Uuid) -> anyhow::Result<Option<Role>> {
        let role: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE users
               SET role = CASE role WHEN 'admin' THEN 'user' ELSE 'admin' END
             WHERE id = $1
            RETURNING role
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("toggle role")?;
        role.map(|(r,)| r.parse()).transpose()
    }

    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET reset_password_token = $2, reset_password_expire = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("set reset token")?;
        Ok(res.rows_affected() > 0)
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        // A concurrent consumer re-checks the WHERE clause after our commit and matches nothing.
        let sql = format!(
            r#"
            UPDATE users
               SET password_hash = $2,
                   reset_password_token = NULL,
                   reset_password_expire = NULL
             WHERE reset_password_token = $1 AND reset_password_expire > $3
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(digest)
            .bind(password_hash)
            .bind(now)
            .fetch_optional(&self.db)
            .await
            .context("consume reset token")?;
        row.map(User::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_playlist_entry(&self, user_id: Uuid, entry: &PlaylistEntry) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET playlist = playlist || jsonb_build_array($2::jsonb)
             WHERE id = $1
               AND NOT playlist @> jsonb_build_array(jsonb_build_object('course', $3::text))
            "#,
        )
        .bind(user_id)
        .bind(Json(entry))
        .bind(entry.course.to_string())
        .execute(&self.db)
        .await
        .context("add playlist entry")?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_playlist_entry(&self, user_id: Uuid, course_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET playlist = COALESCE(
                   (SELECT jsonb_agg(e) FROM jsonb_array_elements(playlist) e
                     WHERE e->>'course' <> $2::text),
                   '[]'::jsonb)
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(course_id.to_string())
        .execute(&self.db)
        .await
        .context("remove playlist entry")?;
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        Ok(n)
    }

    async fn count_active_subscriptions(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE subscription_status = 'active'")
                .fetch_one(&self.db)
                .await
                .context("count active subscriptions")?;
        Ok(n)
    }
}
