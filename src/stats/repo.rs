use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::StatsSnapshot;

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn insert(&self, snapshot: &StatsSnapshot) -> anyhow::Result<()>;
    /// Latest first.
    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<StatsSnapshot>>;
}

#[derive(Clone)]
pub struct PgStatsRepo {
    db: PgPool,
}

impl PgStatsRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StatsRepo for PgStatsRepo {
    async fn insert(&self, snapshot: &StatsSnapshot) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO stats (users, subscriptions, created_at) VALUES ($1, $2, $3)")
            .bind(snapshot.users)
            .bind(snapshot.subscriptions)
            .bind(snapshot.created_at)
            .execute(&self.db)
            .await
            .context("insert stats snapshot")?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<StatsSnapshot>> {
        let rows = sqlx::query_as::<_, StatsSnapshot>(
            "SELECT users, subscriptions, created_at FROM stats ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list stats snapshots")?;
        Ok(rows)
    }
}
