use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StatsTrigger;
use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{NewUser, PlaylistEntry, Role, User},
    },
    error::StoreError,
    media::Asset,
};

/// A [`UserRepo`] that requests a stats recomputation after every successful write.
pub struct TrackedUsers {
    inner: Arc<dyn UserRepo>,
    trigger: StatsTrigger,
}

impl TrackedUsers {
    pub fn new(inner: Arc<dyn UserRepo>, trigger: StatsTrigger) -> Self {
        Self { inner, trigger }
    }

    fn changed(&self) {
        if !self.trigger.notify() {
            tracing::debug!("stats queue full; recomputation request dropped");
        }
    }
}

#[async_trait]
impl UserRepo for TrackedUsers {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        self.inner.find_by_reset_token(digest, now).await
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        self.inner.list_all().await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = self.inner.insert(user).await?;
        self.changed();
        Ok(user)
    }

    async fn set_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let user = self.inner.set_profile(id, name, email).await?;
        if user.is_some() {
            self.changed();
        }
        Ok(user)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let updated = self.inner.set_password_hash(id, password_hash).await?;
        if updated {
            self.changed();
        }
        Ok(updated)
    }

    async fn set_avatar(&self, id: Uuid, avatar: &Asset) -> anyhow::Result<Option<(User, Asset)>> {
        let swapped = self.inner.set_avatar(id, avatar).await?;
        if swapped.is_some() {
            self.changed();
        }
        Ok(swapped)
    }

    async fn toggle_role(&self, id: Uuid) -> anyhow::Result<Option<Role>> {
        let role = self.inner.toggle_role(id).await?;
        if role.is_some() {
            self.changed();
        }
        Ok(role)
    }

    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<bool> {
        let updated = self.inner.set_reset_token(id, digest, expires_at).await?;
        if updated {
            self.changed();
        }
        Ok(updated)
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = self.inner.consume_reset_token(digest, password_hash, now).await?;
        if user.is_some() {
            self.changed();
        }
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.changed();
        }
        Ok(deleted)
    }

    async fn add_playlist_entry(&self, user_id: Uuid, entry: &PlaylistEntry) -> anyhow::Result<bool> {
        let added = self.inner.add_playlist_entry(user_id, entry).await?;
        if added {
            self.changed();
        }
        Ok(added)
    }

    async fn remove_playlist_entry(&self, user_id: Uuid, course_id: Uuid) -> anyhow::Result<()> {
        self.inner.remove_playlist_entry(user_id, course_id).await?;
        self.changed();
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        self.inner.count().await
    }

    async fn count_active_subscriptions(&self) -> anyhow::Result<i64> {
        self.inner.count_active_subscriptions().await
    }
}
