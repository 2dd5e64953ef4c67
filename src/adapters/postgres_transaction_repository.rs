//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{
    CreateOutcome, RepositoryError, RepositoryResult, TransactionRepository, Transition,
};

const COLUMNS: &str = "transaction_id, source_account, destination_account, amount, currency, \
                       status, created_at, processed_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create_if_absent(&self, tx: &Transaction) -> RepositoryResult<CreateOutcome> {
        // ON CONFLICT DO NOTHING makes the primary key the arbiter: the losing
        // insert returns no row instead of raising a unique violation.
        let sql = format!(
            r#"
            INSERT INTO transactions (
                transaction_id, source_account, destination_account, amount, currency,
                status, created_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(&tx.transaction_id)
            .bind(&tx.source_account)
            .bind(&tx.destination_account)
            .bind(&tx.amount)
            .bind(&tx.currency)
            .bind(tx.status.as_str())
            .bind(tx.created_at)
            .bind(tx.processed_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(CreateOutcome::Created(row.into_domain()?)),
            None => Ok(CreateOutcome::AlreadyExists),
        }
    }

    async fn transition(
        &self,
        transaction_id: &str,
        transition: &Transition,
    ) -> RepositoryResult<Option<Transaction>> {
        let expected: Vec<&str> = transition.expected.iter().map(|s| s.as_str()).collect();
        let sql = format!(
            r#"
            UPDATE transactions
            SET status = $2, processed_at = $3
            WHERE transaction_id = $1 AND status = ANY($4)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(transaction_id)
            .bind(transition.next.as_str())
            .bind(transition.processed_at)
            .bind(&expected)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn get(&self, transaction_id: &str) -> RepositoryResult<Option<Transaction>> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE transaction_id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_stale(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> RepositoryResult<Vec<Transaction>> {
        let pending: Vec<&str> = TransactionStatus::PENDING.iter().map(|s| s.as_str()).collect();
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM transactions
            WHERE status = ANY($1) AND created_at < $2
            ORDER BY created_at ASC
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(&pending)
            .bind(created_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    transaction_id: String,
    source_account: String,
    destination_account: String,
    amount: bigdecimal::BigDecimal,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| RepositoryError::Corrupt {
                transaction_id: self.transaction_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Transaction {
            transaction_id: self.transaction_id,
            source_account: self.source_account,
            destination_account: self.destination_account,
            amount: self.amount,
            currency: self.currency,
            status,
            created_at: self.created_at,
            processed_at: self.processed_at,
        })
    }
}
