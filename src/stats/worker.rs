use std::sync::Arc;

use time::OffsetDateTime;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use super::{StatsRepo, StatsSnapshot};
use crate::auth::repo::UserRepo;

/// Handle for requesting a stats recomputation.
///
/// Cheap to clone. Requests go through a bounded channel to a single worker.
#[derive(Clone)]
pub struct StatsTrigger {
    sender: mpsc::Sender<()>,
}

impl StatsTrigger {
    pub(crate) fn new(sender: mpsc::Sender<()>) -> Self {
        Self { sender }
    }

    /// Never blocks. Returns `false` if the request was dropped.
    pub fn notify(&self) -> bool {
        self.sender.try_send(()).is_ok()
    }
}

/// Counts users and active subscriptions and stores one snapshot.
pub async fn recompute(users: &dyn UserRepo, stats: &dyn StatsRepo) -> anyhow::Result<StatsSnapshot> {
    let snapshot = StatsSnapshot {
        users: users.count().await?,
        subscriptions: users.count_active_subscriptions().await?,
        created_at: OffsetDateTime::now_utc(),
    };
    stats.insert(&snapshot).await?;
    Ok(snapshot)
}

async fn run(mut rx: mpsc::Receiver<()>, users: Arc<dyn UserRepo>, stats: Arc<dyn StatsRepo>) {
    while rx.recv().await.is_some() {
        // One recomputation covers everything queued so far.
        while rx.try_recv().is_ok() {}
        match recompute(users.as_ref(), stats.as_ref()).await {
            Ok(s) => debug!(users = s.users, subscriptions = s.subscriptions, "stats recomputed"),
            Err(e) => warn!(error = ?e, "stats recomputation failed"),
        }
    }
    debug!("stats worker stopped");
}

/// Starts the background worker. It stops once every trigger is dropped.
pub fn spawn_stats_worker(
    users: Arc<dyn UserRepo>,
    stats: Arc<dyn StatsRepo>,
    capacity: usize,
) -> (StatsTrigger, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run(rx, users, stats));
    (StatsTrigger::new(tx), handle)
}
