use std::net::SocketAddr;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use txhook_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use txhook_core::config::{Config, LogFormat};
use txhook_core::startup;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => {
            cli::handle_config_show(&config);
            let report = startup::validate_environment(&config).await;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("configuration is invalid");
            }
            Ok(())
        }
        Commands::Tx(command) => {
            let (repository, _pool) = startup::open_repository(&config).await?;
            let components = startup::build_components(&config, repository.clone());
            match command {
                TxCommands::Get { transaction_id } => {
                    cli::handle_tx_get(repository.as_ref(), &transaction_id).await
                }
                TxCommands::Complete { transaction_id } => {
                    cli::handle_tx_complete(&components.worker, &transaction_id).await
                }
                TxCommands::Reconcile => {
                    let scheduler = components.scheduler.clone();
                    cli::handle_tx_reconcile(&components.reconciler, || scheduler.in_flight())
                        .await
                }
            }
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (repository, _pool) = startup::open_repository(&config).await?;
    let components = startup::build_components(&config, repository);

    if config.reconciler_enabled() {
        tokio::spawn(components.reconciler.run());
    } else {
        tracing::warn!("Reconciler disabled; lost completion jobs will not be resumed");
    }

    let mut app = txhook_core::create_app(components.state);
    if let Some(cors) = txhook_core::cors_layer(&config.cors_allowed_origins) {
        app = app.layer(cors);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let pending = components.scheduler.in_flight();
    if pending > 0 {
        // Their records are still pending in the store; the next start's
        // first reconciliation sweep picks them up again.
        tracing::info!(pending, "Abandoning pending completion jobs until next start");
    }
    tracing::info!("server shut down gracefully");

    Ok(())
}
