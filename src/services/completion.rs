use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository, Transition};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// Simulated external confirmation latency.
    pub processing_delay: Duration,
    /// Store-failure retries per step, on top of the first attempt.
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl CompletionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            processing_delay: config.processing_delay,
            max_retries: config.completion_max_retries,
            retry_base: config.completion_retry_base,
        }
    }

    /// Exponential backoff before retry number `attempt` (0-based), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_secs(30),
            max_retries: 5,
            retry_base: Duration::from_millis(500),
        }
    }
}

/// What a completion job ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Processed(Transaction),
    /// The record was already terminal; nothing was written.
    AlreadyTerminal(TransactionStatus),
    /// Another delivery of the job holds the record; it will finish it.
    Superseded(TransactionStatus),
    /// The record no longer exists (purged outside this service).
    Missing,
    /// Retries were exhausted and the record was moved to `FAILED`.
    Failed(Transaction),
    /// Retries were exhausted and the record could not be marked either;
    /// it stays non-terminal for the reconciler to pick up.
    Abandoned,
}

/// Advances a received transaction to a terminal state.
///
/// The worker only ever receives a `transaction_id` and reaches the store
/// through its own repository handle, so nothing from the request that
/// accepted the notification is carried into the job.
pub struct CompletionWorker {
    repository: Arc<dyn TransactionRepository>,
    settings: CompletionSettings,
}

impl CompletionWorker {
    pub fn new(repository: Arc<dyn TransactionRepository>, settings: CompletionSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Waits out the processing delay, then completes the transaction.
    pub async fn run(&self, transaction_id: &str) -> CompletionOutcome {
        debug!(
            transaction_id,
            delay_ms = self.settings.processing_delay.as_millis() as u64,
            "Completion job waiting for external confirmation"
        );
        sleep(self.settings.processing_delay).await;
        self.complete_now(transaction_id).await
    }

    /// Completes the transaction without waiting.
    ///
    /// Both writes are compare-and-swaps on the current status, so running
    /// this more than once for the same id never touches a terminal record.
    pub async fn complete_now(&self, transaction_id: &str) -> CompletionOutcome {
        let claim = Transition::claim();
        let claimed = match self
            .with_retry(transaction_id, "claim", || {
                self.repository.transition(transaction_id, &claim)
            })
            .await
        {
            Ok(Some(tx)) => tx,
            Ok(None) => return self.explain_noop(transaction_id).await,
            Err(e) => return self.give_up(transaction_id, e).await,
        };
        debug!(transaction_id, "Transaction claimed for completion");

        let finish = Transition::complete(claimed.completion_time(Utc::now()));
        match self
            .with_retry(transaction_id, "complete", || {
                self.repository.transition(transaction_id, &finish)
            })
            .await
        {
            Ok(Some(tx)) => {
                info!(
                    transaction_id,
                    processed_at = ?tx.processed_at,
                    "Transaction processed"
                );
                CompletionOutcome::Processed(tx)
            }
            // Another delivery of this job finished first.
            Ok(None) => self.explain_noop(transaction_id).await,
            Err(e) => self.give_up(transaction_id, e).await,
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        transaction_id: &str,
        step: &'static str,
        mut op: F,
    ) -> RepositoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.settings.max_retries => {
                    let backoff = self.settings.backoff(attempt);
                    warn!(
                        transaction_id,
                        step,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Store error during completion, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn explain_noop(&self, transaction_id: &str) -> CompletionOutcome {
        match self
            .with_retry(transaction_id, "inspect", || self.repository.get(transaction_id))
            .await
        {
            Ok(Some(tx)) if tx.status.is_terminal() => {
                debug!(transaction_id, status = %tx.status, "Transaction already terminal");
                CompletionOutcome::AlreadyTerminal(tx.status)
            }
            Ok(Some(tx)) => {
                debug!(transaction_id, status = %tx.status, "Transaction owned by another job");
                CompletionOutcome::Superseded(tx.status)
            }
            Ok(None) => {
                info!(transaction_id, "Transaction no longer present, skipping completion");
                CompletionOutcome::Missing
            }
            Err(e) => {
                warn!(transaction_id, error = %e, "Could not inspect transaction after no-op");
                CompletionOutcome::Abandoned
            }
        }
    }

    async fn give_up(&self, transaction_id: &str, cause: RepositoryError) -> CompletionOutcome {
        error!(
            transaction_id,
            retries = self.settings.max_retries,
            error = %cause,
            "Completion retries exhausted"
        );

        let current = match self.repository.get(transaction_id).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return CompletionOutcome::Missing,
            Err(e) => {
                error!(transaction_id, error = %e, "Leaving transaction for reconciliation");
                return CompletionOutcome::Abandoned;
            }
        };

        let fail = Transition::fail(current.completion_time(Utc::now()));
        match self.repository.transition(transaction_id, &fail).await {
            Ok(Some(tx)) => {
                warn!(transaction_id, "Transaction marked FAILED");
                CompletionOutcome::Failed(tx)
            }
            Ok(None) => self.explain_noop(transaction_id).await,
            Err(e) => {
                error!(transaction_id, error = %e, "Leaving transaction for reconciliation");
                CompletionOutcome::Abandoned
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTransactionRepository;
    use crate::domain::NewTransaction;
    use crate::ports::CreateOutcome;
    use bigdecimal::BigDecimal;

    fn settings() -> CompletionSettings {
        CompletionSettings {
            processing_delay: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_millis(100),
        }
    }

    async fn seeded(repo: &InMemoryTransactionRepository, id: &str) -> Transaction {
        let tx = Transaction::received(
            NewTransaction {
                transaction_id: id.to_string(),
                source_account: "acc_src".to_string(),
                destination_account: "acc_dst".to_string(),
                amount: BigDecimal::from(100),
                currency: "USD".to_string(),
            },
            Utc::now(),
        );
        match repo.create_if_absent(&tx).await.unwrap() {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::AlreadyExists => panic!("seed collided"),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let s = settings();
        assert_eq!(s.backoff(0), Duration::from_millis(100));
        assert_eq!(s.backoff(1), Duration::from_millis(200));
        assert_eq!(s.backoff(3), Duration::from_millis(800));
        assert_eq!(s.backoff(40), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn run_waits_for_delay_then_processes() {
        let repo = InMemoryTransactionRepository::new();
        let created = seeded(&repo, "txn_1").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        let started = tokio::time::Instant::now();
        let outcome = worker.run("txn_1").await;
        assert!(started.elapsed() >= Duration::from_secs(30));

        let tx = match outcome {
            CompletionOutcome::Processed(tx) => tx,
            other => panic!("expected processed, got {:?}", other),
        };
        assert_eq!(tx.status, TransactionStatus::Processed);
        assert!(tx.processed_at.unwrap() >= created.created_at);
        assert_eq!(repo.get("txn_1").await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn second_run_leaves_terminal_record_alone() {
        let repo = InMemoryTransactionRepository::new();
        seeded(&repo, "txn_2").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        let CompletionOutcome::Processed(first) = worker.complete_now("txn_2").await else {
            panic!("first completion should process");
        };
        assert_eq!(
            worker.complete_now("txn_2").await,
            CompletionOutcome::AlreadyTerminal(TransactionStatus::Processed)
        );
        assert_eq!(repo.get("txn_2").await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn missing_record_is_a_noop() {
        let repo = InMemoryTransactionRepository::new();
        let worker = CompletionWorker::new(Arc::new(repo), settings());
        assert_eq!(
            worker.complete_now("never_seen").await,
            CompletionOutcome::Missing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn purged_during_delay_is_a_noop() {
        let repo = InMemoryTransactionRepository::new();
        seeded(&repo, "txn_purged").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        let purge = {
            let repo = repo.clone();
            async move {
                sleep(Duration::from_secs(5)).await;
                repo.purge("txn_purged").await;
            }
        };
        let (outcome, _) = tokio::join!(worker.run("txn_purged"), purge);
        assert_eq!(outcome, CompletionOutcome::Missing);
        assert!(repo.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_store_failures_are_retried() {
        let repo = InMemoryTransactionRepository::new();
        seeded(&repo, "txn_3").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        repo.fail_next(2);
        let outcome = worker.complete_now("txn_3").await;
        assert!(matches!(outcome, CompletionOutcome::Processed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_mark_failed_with_processed_at() {
        let repo = InMemoryTransactionRepository::new();
        let created = seeded(&repo, "txn_4").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        // First attempt plus three retries on the claim.
        repo.fail_next(4);
        let CompletionOutcome::Failed(tx) = worker.complete_now("txn_4").await else {
            panic!("expected failed outcome");
        };
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert!(tx.processed_at.unwrap() >= created.created_at);

        // FAILED is terminal: a re-delivered job does not resurrect it.
        assert_eq!(
            worker.complete_now("txn_4").await,
            CompletionOutcome::AlreadyTerminal(TransactionStatus::Failed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn store_down_for_good_leaves_record_pending() {
        let repo = InMemoryTransactionRepository::new();
        seeded(&repo, "txn_5").await;
        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());

        repo.fail_next(100);
        assert_eq!(
            worker.complete_now("txn_5").await,
            CompletionOutcome::Abandoned
        );

        repo.fail_next(0);
        let tx = repo.get("txn_5").await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Received);
        assert!(tx.processed_at.is_none());
    }

    #[tokio::test]
    async fn resumes_a_claim_left_by_a_dead_job() {
        let repo = InMemoryTransactionRepository::new();
        seeded(&repo, "txn_6").await;
        repo.transition("txn_6", &Transition::claim()).await.unwrap();

        let worker = CompletionWorker::new(Arc::new(repo.clone()), settings());
        assert!(matches!(
            worker.complete_now("txn_6").await,
            CompletionOutcome::Processed(_)
        ));
    }
}
