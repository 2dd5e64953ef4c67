use axum::{
    extract::{Path, State},
    Json,
};

use crate::domain::Transaction;
use crate::error::AppError;
use crate::AppState;

/// `GET /v1/transactions/:transaction_id`
///
/// Always a list: empty when the id is unknown, otherwise one snapshot.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let found = state.lookup.execute(&transaction_id).await?;
    Ok(Json(found))
}
