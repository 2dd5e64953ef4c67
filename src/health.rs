use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::ports::TransactionRepository;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub current_time: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: DependencyStatus,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "HEALTHY"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct StoreChecker {
    repository: Arc<dyn TransactionRepository>,
}

impl StoreChecker {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl DependencyChecker for StoreChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.repository.ping().await {
            Ok(()) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: e.to_string(),
            },
        }
    }
}

pub async fn check_health(store: &dyn DependencyChecker, start_time: Instant) -> HealthResponse {
    let store_status = timeout(Duration::from_secs(5), store.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: "timeout".to_string(),
        });

    let status = match store_status {
        DependencyStatus::Healthy { .. } => "HEALTHY",
        DependencyStatus::Unhealthy { .. } => "UNHEALTHY",
    };

    HealthResponse {
        status: status.to_string(),
        current_time: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        store: store_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryTransactionRepository;

    #[tokio::test]
    async fn healthy_store_reports_healthy() {
        let checker = StoreChecker::new(Arc::new(InMemoryTransactionRepository::new()));
        let response = check_health(&checker, Instant::now()).await;
        assert!(response.is_healthy());
        assert!(matches!(response.store, DependencyStatus::Healthy { .. }));
    }

    #[tokio::test]
    async fn failing_store_reports_unhealthy() {
        let repo = InMemoryTransactionRepository::new();
        repo.fail_next(1);
        let checker = StoreChecker::new(Arc::new(repo));
        let response = check_health(&checker, Instant::now()).await;
        assert_eq!(response.status, "UNHEALTHY");

        let json = serde_json::to_value(&response.store).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert!(json.get("latency_ms").is_none());
    }
}
