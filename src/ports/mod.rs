//! Persistence port for transactions.
//!
//! The core only needs three atomic primitives from a store: create-if-absent
//! keyed by `transaction_id`, a status transition conditioned on the current
//! status, and a point read. Anything that can provide those (relational,
//! document or key-value) can back the service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record {transaction_id}: {reason}")]
    Corrupt {
        transaction_id: String,
        reason: String,
    },
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Unavailable(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result of a create-if-absent.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Transaction),
    AlreadyExists,
}

/// A conditional status change.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The update applies only while the record is in one of these statuses.
    pub expected: Vec<TransactionStatus>,
    pub next: TransactionStatus,
    /// Written together with `next`. Must be `Some` exactly when `next` is terminal.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transition {
    pub fn claim() -> Self {
        Self {
            expected: TransactionStatus::PENDING.to_vec(),
            next: TransactionStatus::Processing,
            processed_at: None,
        }
    }

    pub fn complete(processed_at: DateTime<Utc>) -> Self {
        Self {
            expected: vec![TransactionStatus::Processing],
            next: TransactionStatus::Processed,
            processed_at: Some(processed_at),
        }
    }

    pub fn fail(processed_at: DateTime<Utc>) -> Self {
        Self {
            expected: TransactionStatus::PENDING.to_vec(),
            next: TransactionStatus::Failed,
            processed_at: Some(processed_at),
        }
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts `tx` unless a record with the same `transaction_id` exists.
    /// Atomic with respect to concurrent callers: exactly one of them sees `Created`.
    async fn create_if_absent(&self, tx: &Transaction) -> RepositoryResult<CreateOutcome>;

    /// Applies `transition` if the record exists and its status is one of
    /// `transition.expected`. Returns the updated record, or `None` when
    /// nothing matched.
    async fn transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
    ) -> RepositoryResult<Option<Transaction>>;

    async fn get(&self, transaction_id: &str) -> RepositoryResult<Option<Transaction>>;

    /// Records in a non-terminal status created before `created_before`,
    /// oldest first.
    async fn find_stale(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>>;

    /// Cheap round trip used by the health probe.
    async fn ping(&self) -> RepositoryResult<()>;
}
