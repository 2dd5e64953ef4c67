use crate::adapters::{InMemoryTransactionRepository, PostgresTransactionRepository};
use crate::config::{Config, StoreBackend};
use crate::ports::TransactionRepository;
use crate::services::{
    CompletionSettings, CompletionWorker, ReconcileSettings, Reconciler, TokioCompletionScheduler,
};
use crate::AppState;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

/// Everything `serve` needs, wired from the config.
pub struct Components {
    pub state: AppState,
    pub worker: Arc<CompletionWorker>,
    pub scheduler: Arc<TokioCompletionScheduler>,
    pub reconciler: Reconciler,
}

/// Opens the configured store. Postgres pools are migrated before use.
pub async fn open_repository(
    config: &Config,
) -> Result<(Arc<dyn TransactionRepository>, Option<PgPool>)> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = crate::db::create_pool(config).await?;
            crate::db::run_migrations(&pool).await?;
            let repository = PostgresTransactionRepository::new(pool.clone());
            Ok((Arc::new(repository), Some(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; transactions will not survive a restart");
            Ok((Arc::new(InMemoryTransactionRepository::new()), None))
        }
    }
}

pub fn build_components(config: &Config, repository: Arc<dyn TransactionRepository>) -> Components {
    let worker = Arc::new(CompletionWorker::new(
        repository.clone(),
        CompletionSettings::from_config(config),
    ));
    let scheduler = Arc::new(TokioCompletionScheduler::new(worker.clone()));
    let reconciler = Reconciler::new(
        repository.clone(),
        scheduler.clone(),
        ReconcileSettings::from_config(config),
    );
    let state = AppState::new(repository, scheduler.clone(), config.webhook_secret.clone());

    Components {
        state,
        worker,
        scheduler,
        reconciler,
    }
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Store Connectivity:    {}", status(self.database));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if config.store_backend == StoreBackend::Postgres {
        if let Err(e) = validate_database(config).await {
            report.database = false;
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    // Fields are public, so a config built by hand may skip `from_lookup`.
    config.validate()
}

async fn validate_database(config: &Config) -> Result<()> {
    let pool = crate::db::create_pool(config).await?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(&pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}
