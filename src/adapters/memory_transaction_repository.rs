//! In-memory implementation of TransactionRepository.
//!
//! Holds every record behind a single `RwLock`, which makes create-if-absent
//! and the conditional transition atomic in the same way a primary key and a
//! `WHERE status = ..` clause do in Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::Transaction;
use crate::ports::{
    CreateOutcome, RepositoryError, RepositoryResult, TransactionRepository, Transition,
};

#[derive(Clone, Default)]
pub struct InMemoryTransactionRepository {
    records: Arc<RwLock<HashMap<String, Transaction>>>,
    failures_pending: Arc<AtomicUsize>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` repository calls fail with `Unavailable`.
    pub fn fail_next(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drops a record, as an external retention job would.
    pub async fn purge(&self, transaction_id: &str) -> Option<Transaction> {
        self.records.write().await.remove(transaction_id)
    }

    fn injected_failure(&self) -> RepositoryResult<()> {
        let consumed = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(RepositoryError::Unavailable(
                "injected failure".to_string(),
            )),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn create_if_absent(&self, tx: &Transaction) -> RepositoryResult<CreateOutcome> {
        self.injected_failure()?;

        let mut records = self.records.write().await;
        if records.contains_key(&tx.transaction_id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        records.insert(tx.transaction_id.clone(), tx.clone());
        Ok(CreateOutcome::Created(tx.clone()))
    }

    async fn transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
    ) -> RepositoryResult<Option<Transaction>> {
        self.injected_failure()?;

        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(transaction_id) else {
            return Ok(None);
        };
        if !transition.expected.contains(&record.status) {
            return Ok(None);
        }

        record.status = transition.next;
        record.processed_at = transition.processed_at;
        Ok(Some(record.clone()))
    }

    async fn get(&self, transaction_id: &str) -> RepositoryResult<Option<Transaction>> {
        self.injected_failure()?;
        Ok(self.records.read().await.get(transaction_id).cloned())
    }

    async fn find_stale(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.injected_failure()?;

        let records = self.records.read().await;
        let mut stale: Vec<Transaction> = records
            .values()
            .filter(|tx| !tx.status.is_terminal() && tx.created_at < created_before)
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.created_at);
        stale.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(stale)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.injected_failure()
    }
}
