pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod signature;
pub mod startup;
pub mod use_cases;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::ports::TransactionRepository;
use crate::services::CompletionScheduler;
use crate::use_cases::{GetTransaction, IngestTransaction};

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn TransactionRepository>,
    pub ingest: Arc<IngestTransaction>,
    pub lookup: Arc<GetTransaction>,
    /// When set, notifications must carry a valid HMAC signature.
    pub webhook_secret: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        scheduler: Arc<dyn CompletionScheduler>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            ingest: Arc::new(IngestTransaction::new(repository.clone(), scheduler)),
            lookup: Arc::new(GetTransaction::new(repository.clone())),
            repository,
            webhook_secret,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route(
            "/v1/webhooks/transactions",
            post(handlers::webhook::receive_transaction),
        )
        .route(
            "/v1/transactions/:transaction_id",
            get(handlers::transactions::get_transaction),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
}

/// Lets browser dashboards on the listed origins read transactions.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET]),
    )
}
