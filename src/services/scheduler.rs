use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use super::completion::{CompletionOutcome, CompletionWorker};

/// Runs completion work outside the request that asked for it.
pub trait CompletionScheduler: Send + Sync {
    /// Schedules completion of `transaction_id`. Returns `false` when a job
    /// for that id is already pending in this scheduler.
    fn schedule(&self, transaction_id: &str) -> bool;
}

/// Spawns one detached tokio task per job.
///
/// Tasks are not tied to the request future, so they keep running after the
/// response is sent. Ids with a pending task are tracked so the reconciler
/// does not stack a second job behind one that is still waiting out its delay.
#[derive(Clone)]
pub struct TokioCompletionScheduler {
    worker: Arc<CompletionWorker>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TokioCompletionScheduler {
    pub fn new(worker: Arc<CompletionWorker>) -> Self {
        Self {
            worker,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl CompletionScheduler for TokioCompletionScheduler {
    fn schedule(&self, transaction_id: &str) -> bool {
        let newly_tracked = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(transaction_id.to_string());
        if !newly_tracked {
            debug!(transaction_id, "Completion already pending, not rescheduling");
            return false;
        }

        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            transaction_id: transaction_id.to_string(),
        };
        let worker = self.worker.clone();

        tokio::spawn(async move {
            let transaction_id = guard.transaction_id.clone();
            match worker.run(&transaction_id).await {
                CompletionOutcome::Processed(_)
                | CompletionOutcome::AlreadyTerminal(_)
                | CompletionOutcome::Superseded(_)
                | CompletionOutcome::Missing => {}
                CompletionOutcome::Failed(_) => {
                    warn!(transaction_id = %transaction_id, "Completion job ended in FAILED");
                }
                CompletionOutcome::Abandoned => {
                    error!(
                        transaction_id = %transaction_id,
                        "Completion job abandoned, awaiting reconciliation"
                    );
                }
            }
            drop(guard);
        });

        info!(transaction_id, "Completion scheduled");
        true
    }
}

/// Untracks the id when the job ends, including when its task is dropped
/// at runtime shutdown.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    transaction_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.transaction_id);
    }
}
