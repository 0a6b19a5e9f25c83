use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics::STATS_WORKER_TICKS_TOTAL;
use crate::services::stats_service::StatsService;
use crate::services::store::SessionStore;

/// Periodically recomputes stats for every user with history, so current
/// streaks decay on days without new sessions.
pub struct StatsWorker {
    sessions: Arc<dyn SessionStore>,
    stats: StatsService,
    interval: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub refreshed: usize,
    pub failed: usize,
}

impl StatsWorker {
    pub fn new(sessions: Arc<dyn SessionStore>, stats: StatsService, interval: Duration) -> Self {
        Self {
            sessions,
            stats,
            interval,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting stats worker loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(summary) if summary.failed == 0 => {
                    STATS_WORKER_TICKS_TOTAL.with_label_values(&["success"]).inc();
                    info!(refreshed = summary.refreshed, "Stats worker tick completed");
                }
                Ok(summary) => {
                    STATS_WORKER_TICKS_TOTAL.with_label_values(&["partial"]).inc();
                    warn!(
                        refreshed = summary.refreshed,
                        failed = summary.failed,
                        "Stats worker tick completed with failures"
                    );
                }
                Err(err) => {
                    STATS_WORKER_TICKS_TOTAL.with_label_values(&["error"]).inc();
                    warn!(error = %err, "Stats worker tick failed");
                }
            }

            sleep(self.interval).await;
        }
    }

    /// One pass over all users. A failing user does not stop the pass.
    pub async fn run_once(&self) -> Result<TickSummary> {
        let users = self
            .sessions
            .list_users_with_completed_sessions()
            .await
            .context("Failed to list users with completed sessions")?;

        let mut summary = TickSummary::default();
        for user_id in users {
            match self.stats.recompute(&user_id).await {
                Ok(_) => summary.refreshed += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(user_id = %user_id, error = %err, "Failed to refresh user stats");
                }
            }
        }
        Ok(summary)
    }
}
