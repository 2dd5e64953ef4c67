use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::ports::{RepositoryResult, TransactionRepository};

use super::scheduler::CompletionScheduler;

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Pause between sweeps.
    pub interval: Duration,
    /// A non-terminal record older than this is considered stuck.
    pub stale_after: Duration,
    pub batch_size: i64,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.reconcile_interval,
            stale_after: config.reconcile_stale_after,
            batch_size: config.reconcile_batch_size,
        }
    }
}

/// Reschedules completion for records that were accepted but never finished,
/// e.g. because the process stopped while their job was waiting.
pub struct Reconciler {
    repository: Arc<dyn TransactionRepository>,
    scheduler: Arc<dyn CompletionScheduler>,
    settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        scheduler: Arc<dyn CompletionScheduler>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            repository,
            scheduler,
            settings,
        }
    }

    /// One pass over stale records. Returns how many jobs were scheduled.
    pub async fn sweep(&self) -> RepositoryResult<usize> {
        let stale_after = chrono::Duration::from_std(self.settings.stale_after)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = Utc::now() - stale_after;

        let stale = self
            .repository
            .find_stale(cutoff, self.settings.batch_size)
            .await?;
        if stale.is_empty() {
            return Ok(0);
        }

        debug!("Found {} stale transaction(s)", stale.len());
        let scheduled = stale
            .iter()
            .filter(|tx| self.scheduler.schedule(&tx.transaction_id))
            .count();

        if scheduled > 0 {
            info!(
                scheduled,
                found = stale.len(),
                "Rescheduled completion for stale transactions"
            );
        }
        Ok(scheduled)
    }

    /// Sweeps forever. The first sweep runs immediately so work left over
    /// from a previous process resumes at startup.
    pub async fn run(self) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            stale_after_secs = self.settings.stale_after.as_secs(),
            "Reconciler started"
        );

        loop {
            if let Err(e) = self.sweep().await {
                error!("Reconciler sweep error: {}", e);
            }

            sleep(self.settings.interval).await;
        }
    }
}
