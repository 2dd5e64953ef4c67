//! Point lookup of a transaction's current state.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, TransactionRepository};
use crate::validation::{validate_transaction_id, ValidationError};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("malformed transaction id: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Read-only view of the store. Absence is a normal result, not an error.
pub struct GetTransaction {
    repository: Arc<dyn TransactionRepository>,
}

impl GetTransaction {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    /// Returns zero or one snapshot, whatever the store holds right now.
    pub async fn execute(&self, transaction_id: &str) -> Result<Vec<Transaction>, LookupError> {
        validate_transaction_id(transaction_id)?;
        let found = self.repository.get(transaction_id).await?;
        Ok(found.into_iter().collect())
    }
}
