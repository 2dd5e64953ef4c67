use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::ports::TransactionRepository;
use crate::services::{CompletionOutcome, CompletionWorker, Reconciler};

#[derive(Parser)]
#[command(name = "txhook-core")]
#[command(about = "Transaction webhook ingestion and completion service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Print the stored snapshot of a transaction
    Get {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
    },

    /// Complete a pending transaction now, skipping the processing delay
    Complete {
        #[arg(value_name = "TX_ID")]
        transaction_id: String,
    },

    /// Run one reconciliation sweep and wait for the rescheduled jobs
    Reconcile,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_get(
    repository: &dyn TransactionRepository,
    transaction_id: &str,
) -> anyhow::Result<()> {
    let found: Vec<_> = repository.get(transaction_id).await?.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

pub async fn handle_tx_complete(
    worker: &CompletionWorker,
    transaction_id: &str,
) -> anyhow::Result<()> {
    match worker.complete_now(transaction_id).await {
        CompletionOutcome::Processed(tx) => {
            tracing::info!("Transaction {} marked as processed", transaction_id);
            println!("✓ Transaction {} processed at {:?}", transaction_id, tx.processed_at);
            Ok(())
        }
        CompletionOutcome::AlreadyTerminal(status) => {
            println!("Transaction {} is already {}", transaction_id, status);
            Ok(())
        }
        CompletionOutcome::Superseded(status) => {
            println!(
                "Transaction {} is being completed by another job ({})",
                transaction_id, status
            );
            Ok(())
        }
        CompletionOutcome::Missing => {
            tracing::warn!("Transaction {} not found", transaction_id);
            anyhow::bail!("Transaction {} not found", transaction_id)
        }
        CompletionOutcome::Failed(_) => {
            anyhow::bail!("Transaction {} could not be completed and was marked FAILED", transaction_id)
        }
        CompletionOutcome::Abandoned => {
            anyhow::bail!("Store unavailable, transaction {} left pending", transaction_id)
        }
    }
}

/// Sweeps once, then keeps the process alive until the jobs it scheduled
/// have finished.
pub async fn handle_tx_reconcile(
    reconciler: &Reconciler,
    in_flight: impl Fn() -> usize,
) -> anyhow::Result<()> {
    let scheduled = reconciler.sweep().await?;
    println!("Rescheduled {} stale transaction(s)", scheduled);

    while in_flight() > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
    println!("✓ Reconciliation finished");
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_show(config: &Config) {
    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Store Backend: {:?}", config.store_backend);
    if let Some(url) = &config.database_url {
        println!("  Database URL: {}", mask_password(url));
    }
    println!("  Processing Delay: {}s", config.processing_delay.as_secs());
    println!(
        "  Completion Retries: {} (base {}ms)",
        config.completion_max_retries,
        config.completion_retry_base.as_millis()
    );
    println!(
        "  Reconciler: every {}s, stale after {}s",
        config.reconcile_interval.as_secs(),
        config.reconcile_stale_after.as_secs()
    );
    println!(
        "  Webhook Signatures: {}",
        if config.webhook_secret.is_some() { "required" } else { "disabled" }
    );
}

fn mask_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}://{}:****{}",
            &url[..scheme_end],
            &credentials[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
