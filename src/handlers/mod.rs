pub mod transactions;
pub mod webhook;

use crate::health::{check_health, StoreChecker};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

/// Liveness probe: server time plus a store round trip.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checker = StoreChecker::new(state.repository.clone());
    let response = check_health(&checker, state.start_time).await;

    // Return 503 if the store is down, 200 otherwise
    let status_code = if response.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
