// HTTP request handlers for the Persona Arena API
//
// Every response carries `success`. Failures add `error`, `kind` and
// `retryable` so clients can tell a resend apart from a rejected request.
// The requester is whoever the `x-user-id` header names; signatures are
// verified upstream.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::SharedState;
use crate::battle::CreateBattle;
use crate::error::ArenaError;
use crate::marketplace::ListingFilter;
use crate::models::{BattleMode, Tier};
use crate::store::PersonaFilter;

pub type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub const USER_HEADER: &str = "x-user-id";

pub fn status_for(err: &ArenaError) -> StatusCode {
    match err {
        ArenaError::NotFound { .. } => StatusCode::NOT_FOUND,
        ArenaError::InvalidState(_) | ArenaError::AlreadyListed { .. } => StatusCode::CONFLICT,
        ArenaError::Forbidden(_) => StatusCode::FORBIDDEN,
        ArenaError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ArenaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ArenaError::AiUnavailable(_) | ArenaError::PriceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ArenaError::AiInvalidResponse(_) | ArenaError::SettlementFailed(_) => StatusCode::BAD_GATEWAY,
        ArenaError::Configuration(_) | ArenaError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn api_error(err: ArenaError) -> (StatusCode, Json<Value>) {
    (
        status_for(&err),
        Json(json!({
            "success": false,
            "error": err.to_string(),
            "kind": err.kind(),
            "retryable": err.is_retryable(),
        })),
    )
}

pub fn requester(headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| api_error(ArenaError::forbidden(format!("{} header required", USER_HEADER))))
}

pub async fn health_check() -> &'static str {
    "Persona Arena - Online"
}

// ===== PERSONAS =====

#[derive(Debug, Deserialize)]
pub struct EvaluatePromptRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    pub prompt: String,
    /// Defaults to the requester id
    pub wallet_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PersonaQuery {
    pub tier: Option<Tier>,
    pub owner_id: Option<String>,
    pub limit: Option<usize>,
}

/// POST /personas/evaluate
pub async fn evaluate_prompt(
    State(state): State<SharedState>,
    Json(request): Json<EvaluatePromptRequest>,
) -> ApiResult {
    let evaluation = state.creation.evaluate_prompt(&request.prompt).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "evaluation": evaluation })))
}

/// POST /personas
pub async fn create_persona(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreatePersonaRequest>,
) -> ApiResult {
    let user_id = requester(&headers)?;
    let wallet = request.wallet_address.unwrap_or_else(|| user_id.clone());
    let created = state
        .creation
        .create_persona(&request.prompt, &user_id, &wallet)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "persona": created.persona,
        "evaluation": created.evaluation,
        "gacha": created.gacha,
    })))
}

/// GET /personas
pub async fn list_personas(State(state): State<SharedState>, Query(query): Query<PersonaQuery>) -> ApiResult {
    let filter = PersonaFilter { tier: query.tier, owner_id: query.owner_id, limit: query.limit };
    let personas = state.creation.list(&filter).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "count": personas.len(), "personas": personas })))
}

/// GET /personas/:id
pub async fn get_persona(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let persona = state.creation.get(&id).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "persona": persona })))
}

// ===== BATTLES =====

#[derive(Debug, Deserialize)]
pub struct CreateBattleRequest {
    pub persona1_id: String,
    pub persona2_id: String,
    pub mode: BattleMode,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// POST /battles
pub async fn create_battle(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateBattleRequest>,
) -> ApiResult {
    let initiator_id = requester(&headers)?;
    let battle = state
        .battles
        .create(CreateBattle {
            persona1_id: request.persona1_id,
            persona2_id: request.persona2_id,
            mode: request.mode,
            topic: request.topic,
            initiator_id,
        })
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "success": true, "battle": battle })))
}

/// POST /battles/:id/start
pub async fn start_battle(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let outcome = state.battles.start(&id).await.map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "battle": outcome.battle,
        "persona1_argument": outcome.persona1_argument,
        "persona2_argument": outcome.persona2_argument,
    })))
}

/// POST /battles/:id/judge
pub async fn judge_battle(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let outcome = state.battles.judge(&id).await.map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "battle": outcome.battle,
        "winner_id": outcome.winner_id,
        "loser_id": outcome.loser_id,
        "rewards": outcome.rewards,
        "rating": outcome.rating,
        "transaction": outcome.deposit,
    })))
}

/// GET /battles/:id
pub async fn get_battle(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let battle = state.battles.get(&id).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "battle": battle })))
}

/// GET /battles/persona/:persona_id/history
pub async fn battle_history(
    State(state): State<SharedState>,
    Path(persona_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let battles = state.battles.history(&persona_id, query.limit).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "persona_id": persona_id, "count": battles.len(), "battles": battles })))
}

/// GET /battles/leaderboard
pub async fn leaderboard(State(state): State<SharedState>, Query(query): Query<LimitQuery>) -> ApiResult {
    let personas = state.battles.leaderboard(query.limit).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "leaderboard": personas })))
}

// ===== MARKETPLACE =====

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub persona_id: String,
    pub price: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuyListingRequest {
    /// Defaults to the buyer id
    pub buyer_wallet: Option<String>,
}

/// POST /marketplace/listings
pub async fn create_listing(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<CreateListingRequest>,
) -> ApiResult {
    let seller_id = requester(&headers)?;
    let listing = state
        .marketplace
        .list(&request.persona_id, request.price, &seller_id)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "success": true, "listing": listing })))
}

/// GET /marketplace/listings
pub async fn active_listings(State(state): State<SharedState>, Query(filter): Query<ListingFilter>) -> ApiResult {
    let listings = state.marketplace.active_listings(&filter).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "count": listings.len(), "listings": listings })))
}

/// GET /marketplace/listings/:id
pub async fn get_listing(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult {
    let listing = state.marketplace.get_listing(&id).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "listing": listing })))
}

/// POST /marketplace/listings/:id/cancel
pub async fn cancel_listing(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    let requester_id = requester(&headers)?;
    let listing = state.marketplace.cancel(&id, &requester_id).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "listing": listing })))
}

/// POST /marketplace/listings/:id/buy
pub async fn buy_listing(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Option<Json<BuyListingRequest>>,
) -> ApiResult {
    let buyer_id = requester(&headers)?;
    let Json(request) = request.unwrap_or_default();
    let wallet = request.buyer_wallet.unwrap_or_else(|| buyer_id.clone());
    let listing = state.marketplace.buy(&id, &buyer_id, &wallet).await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "listing": listing, "settlement": listing.settlement })))
}

/// GET /marketplace/stats
pub async fn marketplace_stats(State(state): State<SharedState>) -> ApiResult {
    let stats = state.marketplace.stats().await.map_err(api_error)?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

// ===== COST =====

#[derive(Debug, Deserialize)]
pub struct PersonaCostQuery {
    pub prompt_length: Option<usize>,
}

/// Prompt length assumed when the caller gives none.
const DEFAULT_PROMPT_LENGTH: usize = 200;

/// GET /cost/persona
pub async fn persona_cost(State(state): State<SharedState>, Query(query): Query<PersonaCostQuery>) -> ApiResult {
    let estimate = state
        .costs
        .estimate_creation(query.prompt_length.unwrap_or(DEFAULT_PROMPT_LENGTH))
        .await;
    Ok(Json(json!({ "success": true, "estimate": estimate })))
}

/// GET /cost/battle/:mode
pub async fn battle_cost(State(state): State<SharedState>, Path(mode): Path<String>) -> ApiResult {
    let mode = BattleMode::parse(&mode)
        .ok_or_else(|| api_error(ArenaError::invalid_input(format!("unknown battle mode: {}", mode))))?;
    let estimate = state.battles.estimate_cost(mode).await;
    Ok(Json(json!({ "success": true, "estimate": estimate })))
}

/// GET /cost/pricing
pub async fn pricing(State(state): State<SharedState>) -> ApiResult {
    Ok(Json(json!({ "success": true, "pricing": state.costs.pricing_view() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_body_shape() {
        let (status, Json(body)) = api_error(ArenaError::InsufficientBalance {
            available: dec!(1),
            requested: dec!(2),
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "INSUFFICIENT_BALANCE");
        assert_eq!(body["retryable"], false);
    }

    #[test]
    fn test_retryable_errors_flagged() {
        let (status, Json(body)) = api_error(ArenaError::SettlementFailed("rpc down".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["retryable"], true);
    }

    #[test]
    fn test_requester_header() {
        let mut headers = HeaderMap::new();
        assert!(requester(&headers).is_err());
        headers.insert(USER_HEADER, HeaderValue::from_static("  alice "));
        assert_eq!(requester(&headers).unwrap(), "alice");
    }
}
