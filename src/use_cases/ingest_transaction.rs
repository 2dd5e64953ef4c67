//! Ingest transaction use case.
//! Records a notification exactly once and schedules its completion.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{NewTransaction, Transaction};
use crate::ports::{CreateOutcome, RepositoryError, TransactionRepository};
use crate::services::CompletionScheduler;
use crate::validation::{validate_notification, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// First sighting: the record was created and completion scheduled.
    AcceptedNew(Transaction),
    /// The id was already known; nothing was written or scheduled.
    AcceptedDuplicate,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed notification: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

pub struct IngestTransaction {
    repository: Arc<dyn TransactionRepository>,
    scheduler: Arc<dyn CompletionScheduler>,
}

impl IngestTransaction {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        scheduler: Arc<dyn CompletionScheduler>,
    ) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    pub async fn execute(&self, notification: NewTransaction) -> Result<IngestOutcome, IngestError> {
        validate_notification(&notification)?;

        // Fast path for redeliveries. Not relied on for correctness: two
        // concurrent first deliveries both get past this read.
        if self
            .repository
            .get(&notification.transaction_id)
            .await?
            .is_some()
        {
            info!(
                transaction_id = %notification.transaction_id,
                "Duplicate notification ignored"
            );
            return Ok(IngestOutcome::AcceptedDuplicate);
        }

        let tx = Transaction::received(notification, Utc::now());
        match self.repository.create_if_absent(&tx).await? {
            CreateOutcome::Created(stored) => {
                if !self.scheduler.schedule(&stored.transaction_id) {
                    warn!(
                        transaction_id = %stored.transaction_id,
                        "New transaction already had a pending completion job"
                    );
                }
                info!(
                    transaction_id = %stored.transaction_id,
                    currency = %stored.currency,
                    "Transaction received"
                );
                Ok(IngestOutcome::AcceptedNew(stored))
            }
            CreateOutcome::AlreadyExists => {
                info!(
                    transaction_id = %tx.transaction_id,
                    "Lost creation race to a concurrent notification, treating as duplicate"
                );
                Ok(IngestOutcome::AcceptedDuplicate)
            }
        }
    }
}
