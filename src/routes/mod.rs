// Routes module - assembles every HTTP endpoint into one router

pub mod wallets;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ===== PERSONAS =====
        .route("/personas/evaluate", post(evaluate_prompt))
        .route("/personas", post(create_persona).get(list_personas))
        .route("/personas/:id", get(get_persona))
        // ===== BATTLES =====
        .route("/battles", post(create_battle))
        .route("/battles/leaderboard", get(leaderboard))
        .route("/battles/persona/:persona_id/history", get(battle_history))
        .route("/battles/:id", get(get_battle))
        .route("/battles/:id/start", post(start_battle))
        .route("/battles/:id/judge", post(judge_battle))
        // ===== MARKETPLACE =====
        .route("/marketplace/listings", post(create_listing).get(active_listings))
        .route("/marketplace/listings/:id", get(get_listing))
        .route("/marketplace/listings/:id/cancel", post(cancel_listing))
        .route("/marketplace/listings/:id/buy", post(buy_listing))
        .route("/marketplace/stats", get(marketplace_stats))
        // ===== WALLETS =====
        .route("/wallets/:persona_id", get(wallets::get_wallet))
        .route("/wallets/:persona_id/transactions", get(wallets::get_transactions))
        .route("/wallets/:persona_id/withdraw", post(wallets::withdraw))
        // ===== COST =====
        .route("/cost/persona", get(persona_cost))
        .route("/cost/battle/:mode", get(battle_cost))
        .route("/cost/pricing", get(pricing))
        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
