//! Transaction domain entity.
//! Framework-agnostic representation of a notified transaction and its lifecycle.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a transaction.
///
/// `Received` is the initial state, `Processing` marks a record a completion
/// job has claimed, `Processed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl TransactionStatus {
    /// Statuses a completion job may still act on.
    pub const PENDING: [TransactionStatus; 2] =
        [TransactionStatus::Received, TransactionStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Received => "RECEIVED",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Processed => "PROCESSED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Processed | TransactionStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Terminal states have no outgoing edges. `Processing -> Processing` is
    /// allowed so a re-delivered job can take over a claim left behind by a
    /// job that died mid-flight.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Received, Processing)
                | (Received, Processed)
                | (Received, Failed)
                | (Processing, Processing)
                | (Processing, Processed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(TransactionStatus::Received),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "PROCESSED" => Ok(TransactionStatus::Processed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Domain entity representing a stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub source_account: String,
    pub destination_account: String,
    #[serde(with = "crate::domain::amount")]
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Builds a freshly received record from an accepted notification.
    pub fn received(new: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: new.transaction_id,
            source_account: new.source_account,
            destination_account: new.destination_account,
            amount: new.amount,
            currency: new.currency,
            status: TransactionStatus::Received,
            created_at,
            processed_at: None,
        }
    }

    /// Timestamp to record when this transaction reaches a terminal state.
    ///
    /// Never earlier than `created_at`, even if the wall clock stepped back.
    pub fn completion_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.created_at)
    }
}

/// Fields supplied by an incoming notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub source_account: String,
    pub destination_account: String,
    #[serde(with = "crate::domain::amount")]
    pub amount: BigDecimal,
    pub currency: String,
}
