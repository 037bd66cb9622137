// Persona wallet routes
//
// Wallets belong to personas, not users. Reads are open; withdrawals are
// restricted to the persona's current owner.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::SharedState;
use crate::handlers::{api_error, requester, ApiResult, LimitQuery};

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    /// Off-platform address receiving the funds
    pub destination: String,
}

/// GET /wallets/:persona_id
pub async fn get_wallet(State(state): State<SharedState>, Path(persona_id): Path<String>) -> ApiResult {
    let wallet = state.ledger.get_wallet(&persona_id).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "wallet": wallet })))
}

/// GET /wallets/:persona_id/transactions
pub async fn get_transactions(
    State(state): State<SharedState>,
    Path(persona_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let transactions = state
        .ledger
        .history(&persona_id, query.limit)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "persona_id": persona_id,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

/// POST /wallets/:persona_id/withdraw
pub async fn withdraw(
    State(state): State<SharedState>,
    Path(persona_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult {
    let requester_id = requester(&headers)?;
    let tx = state
        .ledger
        .withdraw(&persona_id, request.amount, &requester_id, &request.destination)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "success": true, "transaction": tx })))
}
