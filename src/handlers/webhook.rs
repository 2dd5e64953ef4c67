use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::NewTransaction;
use crate::error::AppError;
use crate::signature::{self, SIGNATURE_HEADER};
use crate::use_cases::IngestOutcome;
use crate::AppState;

pub const MESSAGE_RECEIVED: &str = "Transaction received";
pub const MESSAGE_ALREADY_RECEIVED: &str = "Transaction already received";

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub message: String,
}

/// `POST /v1/webhooks/transactions`
///
/// Both new and repeated notifications are acknowledged with 202; only the
/// message tells them apart.
pub async fn receive_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok());
        signature::verify(secret, provided, &body)?;
    }

    let notification: NewTransaction = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed notification: {}", e)))?;

    let message = match state.ingest.execute(notification).await? {
        IngestOutcome::AcceptedNew(_) => MESSAGE_RECEIVED,
        IngestOutcome::AcceptedDuplicate => MESSAGE_ALREADY_RECEIVED,
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAck {
            message: message.to_string(),
        }),
    ))
}
