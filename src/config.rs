use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub store_backend: StoreBackend,
    pub processing_delay: Duration,
    pub completion_max_retries: u32,
    pub completion_retry_base: Duration,
    /// Zero disables the reconciler.
    pub reconcile_interval: Duration,
    pub reconcile_stale_after: Duration,
    pub reconcile_batch_size: i64,
    pub webhook_secret: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Config {
            server_port: var("SERVER_PORT", "8000")
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            store_backend: var("STORE_BACKEND", "postgres").parse()?,
            processing_delay: Duration::from_secs(
                var("PROCESSING_DELAY_SECS", "30")
                    .parse()
                    .context("PROCESSING_DELAY_SECS must be a whole number of seconds")?,
            ),
            completion_max_retries: var("COMPLETION_MAX_RETRIES", "5")
                .parse()
                .context("COMPLETION_MAX_RETRIES must be a non-negative integer")?,
            completion_retry_base: Duration::from_millis(
                var("COMPLETION_RETRY_BASE_MS", "500")
                    .parse()
                    .context("COMPLETION_RETRY_BASE_MS must be a whole number of milliseconds")?,
            ),
            reconcile_interval: Duration::from_secs(
                var("RECONCILE_INTERVAL_SECS", "60")
                    .parse()
                    .context("RECONCILE_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            reconcile_stale_after: Duration::from_secs(
                var("RECONCILE_STALE_AFTER_SECS", "120")
                    .parse()
                    .context("RECONCILE_STALE_AFTER_SECS must be a whole number of seconds")?,
            ),
            reconcile_batch_size: var("RECONCILE_BATCH_SIZE", "100")
                .parse()
                .context("RECONCILE_BATCH_SIZE must be an integer")?,
            webhook_secret: lookup("WEBHOOK_SECRET").filter(|v| !v.is_empty()),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            log_format: var("LOG_FORMAT", "text").parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks. A config that passes can run the reconciler.
    pub fn validate(&self) -> Result<()> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        if self.reconcile_batch_size < 1 {
            anyhow::bail!(
                "RECONCILE_BATCH_SIZE must be at least 1, got {}",
                self.reconcile_batch_size
            );
        }
        if self.reconciler_enabled() && self.reconcile_stale_after <= self.processing_delay {
            anyhow::bail!(
                "RECONCILE_STALE_AFTER_SECS ({}) must exceed PROCESSING_DELAY_SECS ({})",
                self.reconcile_stale_after.as_secs(),
                self.processing_delay.as_secs()
            );
        }

        Ok(())
    }

    pub fn reconciler_enabled(&self) -> bool {
        !self.reconcile_interval.is_zero()
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/tx")]).unwrap();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.processing_delay, Duration::from_secs(30));
        assert_eq!(config.completion_max_retries, 5);
        assert_eq!(config.reconcile_stale_after, Duration::from_secs(120));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.webhook_secret.is_none());
        assert!(config.cors_allowed_origins.is_empty());
        assert!(config.reconciler_enabled());
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory")]).is_ok());
    }

    #[test]
    fn rejects_bad_numbers_and_unknown_enums() {
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("SERVER_PORT", "abc")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("PROCESSING_DELAY_SECS", "-1")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "redis")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn rejects_batch_size_below_one() {
        let err = config_from(&[("STORE_BACKEND", "memory"), ("RECONCILE_BATCH_SIZE", "-1")])
            .unwrap_err();
        assert!(err.to_string().contains("RECONCILE_BATCH_SIZE"));
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("RECONCILE_BATCH_SIZE", "0")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("RECONCILE_BATCH_SIZE", "1")]).is_ok());
    }

    #[test]
    fn rejects_stale_window_not_longer_than_delay() {
        let vars = [
            ("STORE_BACKEND", "memory"),
            ("PROCESSING_DELAY_SECS", "30"),
            ("RECONCILE_STALE_AFTER_SECS", "30"),
        ];
        assert!(config_from(&vars).is_err());

        // Irrelevant once the sweep is off.
        let mut disabled = vars.to_vec();
        disabled.push(("RECONCILE_INTERVAL_SECS", "0"));
        assert!(config_from(&disabled).is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("SERVER_PORT", "0")]).is_err());
    }

    #[test]
    fn parses_overrides() {
        let config = config_from(&[
            ("STORE_BACKEND", "memory"),
            ("PROCESSING_DELAY_SECS", "2"),
            ("RECONCILE_INTERVAL_SECS", "0"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:5173, ,https://dash.example.com"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.processing_delay, Duration::from_secs(2));
        assert!(!config.reconciler_enabled());
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:5173", "https://dash.example.com"]
        );
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
