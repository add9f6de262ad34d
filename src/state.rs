use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{
    auth::repo::{PgUserRepo, UserRepo},
    config::AppConfig,
    courses::repo::{CourseRepo, PgCourseRepo},
    mailer::{Mailer, SmtpMailer, UnconfiguredMailer},
    media::{s3::S3Gateway, MediaAssets},
    stats::{spawn_stats_worker, PgStatsRepo, StatsRepo, TrackedUsers},
};

/// Capacity of the stats recomputation queue.
const STATS_QUEUE: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub courses: Arc<dyn CourseRepo>,
    pub stats: Arc<dyn StatsRepo>,
    pub media: MediaAssets,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;
        Ok(db)
    }

    /// Wires the Postgres repositories, the stats worker and the optional
    /// media host and mail relay. Must run inside a tokio runtime.
    pub async fn from_pool(db: PgPool, config: AppConfig) -> anyhow::Result<Self> {
        let stats: Arc<dyn StatsRepo> = Arc::new(PgStatsRepo::new(db.clone()));
        let raw_users: Arc<dyn UserRepo> = Arc::new(PgUserRepo::new(db.clone()));
        let (trigger, _worker) = spawn_stats_worker(raw_users.clone(), stats.clone(), STATS_QUEUE);
        let users: Arc<dyn UserRepo> = Arc::new(TrackedUsers::new(raw_users, trigger));

        let media = match &config.media {
            Some(cfg) => MediaAssets::new(Arc::new(S3Gateway::new(cfg).await?)),
            None => {
                warn!("media host not configured; uploads fall back to placeholders");
                MediaAssets::disabled()
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(cfg) => Arc::new(SmtpMailer::new(cfg)?),
            None => {
                warn!("SMTP not configured; password reset emails are disabled");
                Arc::new(UnconfiguredMailer)
            }
        };

        info!(production = config.production, "application state ready");
        Ok(Self {
            config: Arc::new(config),
            users,
            courses: Arc::new(PgCourseRepo::new(db)),
            stats,
            media,
            mailer,
        })
    }
}
