//! Cost estimator.
//!
//! Turns token counts into itemised USD breakdowns using the pricing row of the
//! configured AI backend, and converts totals to the native currency through a
//! cached exchange rate. The rate is best-effort: when the feed is down the
//! last good value (or the configured default) is used instead.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ArenaError, ArenaResult};
use crate::models::BattleMode;
use crate::pricing::{round_native, round_usd, PricingTable, ProviderKind, ProviderPricing};

// ============================================================================
// TOKEN SIZES
// ============================================================================

const EVAL_OVERHEAD_TOKENS: u64 = 100;
const EVAL_OUTPUT_TOKENS: u64 = 100;
const GENERATION_OVERHEAD_TOKENS: u64 = 200;
const GENERATION_OUTPUT_TOKENS: u64 = 800;

const ARGUMENT_INPUT_TOKENS: u64 = 500;
const ARGUMENT_OUTPUT_TOKENS: u64 = 400;
const JUDGE_INPUT_TOKENS: u64 = 1000;
const JUDGE_OUTPUT_TOKENS: u64 = 600;

/// Roughly four characters per token.
fn prompt_tokens(prompt_len: usize) -> u64 {
    (prompt_len as u64).div_ceil(4)
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

/// Itemised cost of creating one persona. USD unless noted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub prompt_evaluation: Decimal,
    pub text_generation: Decimal,
    pub image_generation: Decimal,
    pub blockchain: Decimal,
    pub platform_fee: Decimal,
    pub subtotal: Decimal,
    pub total_usd: Decimal,
    /// `total_usd` in the native currency
    pub total_native: Decimal,
    pub native_price_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleCostEstimate {
    pub mode: BattleMode,
    /// Native currency
    pub entry_fee: Decimal,
    pub ai_cost_usd: Decimal,
    pub ai_cost_native: Decimal,
    /// Entry fee plus AI cost, native currency
    pub total: Decimal,
    pub native_price_usd: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingView {
    pub provider: ProviderKind,
    pub pricing: ProviderPricing,
    pub blockchain_usd: Decimal,
    pub platform_markup: Decimal,
    pub operations: Vec<OperationSize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationSize {
    pub operation: &'static str,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

fn assemble(
    table: &PricingTable,
    prompt_evaluation: Decimal,
    text_generation: Decimal,
    image_generation: Decimal,
    native_price_usd: Decimal,
) -> CostBreakdown {
    let blockchain = table.blockchain_usd;
    let subtotal = prompt_evaluation + text_generation + image_generation + blockchain;
    let platform_fee = subtotal * table.platform_markup;
    let total_usd = subtotal + platform_fee;
    CostBreakdown {
        prompt_evaluation: round_usd(prompt_evaluation),
        text_generation: round_usd(text_generation),
        image_generation: round_usd(image_generation),
        blockchain: round_usd(blockchain),
        platform_fee: round_usd(platform_fee),
        subtotal: round_usd(subtotal),
        total_usd: round_usd(total_usd),
        total_native: round_native(total_usd / native_price_usd),
        native_price_usd,
    }
}

/// Creation estimate for a prompt of `prompt_len` characters.
pub fn creation_breakdown(
    table: &PricingTable,
    provider: ProviderKind,
    prompt_len: usize,
    native_price_usd: Decimal,
) -> CostBreakdown {
    let rates = table.for_provider(provider);
    let tokens = prompt_tokens(prompt_len);
    let evaluation = rates
        .evaluation
        .cost(tokens + EVAL_OVERHEAD_TOKENS, EVAL_OUTPUT_TOKENS);
    let generation = rates
        .text
        .cost(tokens + GENERATION_OVERHEAD_TOKENS, GENERATION_OUTPUT_TOKENS);
    assemble(table, evaluation, generation, rates.image, native_price_usd)
}

/// Two arguments and one judgment at text rates.
pub fn battle_ai_cost(table: &PricingTable, provider: ProviderKind) -> Decimal {
    let text = table.for_provider(provider).text;
    let argument = text.cost(ARGUMENT_INPUT_TOKENS, ARGUMENT_OUTPUT_TOKENS);
    let judgment = text.cost(JUDGE_INPUT_TOKENS, JUDGE_OUTPUT_TOKENS);
    round_usd(dec!(2) * argument + judgment)
}

// ============================================================================
// EXCHANGE RATE
// ============================================================================

/// USD price of one native unit.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn native_price_usd(&self) -> ArenaResult<Decimal>;
}

pub struct StaticPrice(pub Decimal);

#[async_trait]
impl PriceSource for StaticPrice {
    async fn native_price_usd(&self) -> ArenaResult<Decimal> {
        Ok(self.0)
    }
}

#[derive(Deserialize)]
struct PriceResponse {
    price: Decimal,
}

/// GET `url` → `{ "price": <number> }`.
pub struct HttpPriceFeed {
    url: String,
    client: Client,
}

impl HttpPriceFeed {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { url, client }
    }
}

#[async_trait]
impl PriceSource for HttpPriceFeed {
    async fn native_price_usd(&self) -> ArenaResult<Decimal> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ArenaError::PriceUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ArenaError::PriceUnavailable(format!(
                "price feed returned status {}",
                response.status()
            )));
        }
        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::PriceUnavailable(e.to_string()))?;
        if body.price <= Decimal::ZERO {
            return Err(ArenaError::PriceUnavailable(format!("price feed returned {}", body.price)));
        }
        Ok(body.price)
    }
}

/// Keeps the last good rate for `ttl`. Never fails.
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    ttl: Duration,
    default_price: Decimal,
    cached: RwLock<Option<(Decimal, Instant)>>,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, ttl: Duration, default_price: Decimal) -> Self {
        Self { inner, ttl, default_price, cached: RwLock::new(None) }
    }

    /// Fixed rate, no feed.
    pub fn fixed(price: Decimal) -> Self {
        Self::new(Arc::new(StaticPrice(price)), Duration::from_secs(u64::MAX / 4), price)
    }

    pub async fn current(&self) -> Decimal {
        if let Some((price, fetched_at)) = *self.cached.read().await {
            if fetched_at.elapsed() < self.ttl {
                return price;
            }
        }

        match self.inner.native_price_usd().await {
            Ok(price) => {
                debug!(price = %price, "exchange rate refreshed");
                *self.cached.write().await = Some((price, Instant::now()));
                price
            }
            Err(e) => {
                let stale = self.cached.read().await.map(|(price, _)| price);
                let price = stale.unwrap_or(self.default_price);
                warn!(error = %e, price = %price, stale = stale.is_some(), "exchange rate unavailable, using fallback");
                price
            }
        }
    }
}

// ============================================================================
// ESTIMATOR
// ============================================================================

pub struct CostEstimator {
    table: PricingTable,
    provider: ProviderKind,
    prices: CachedPriceSource,
}

impl CostEstimator {
    pub fn new(table: PricingTable, provider: ProviderKind, prices: CachedPriceSource) -> Self {
        Self { table, provider, prices }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub async fn native_price(&self) -> Decimal {
        self.prices.current().await
    }

    pub async fn estimate_creation(&self, prompt_len: usize) -> CostBreakdown {
        let price = self.native_price().await;
        creation_breakdown(&self.table, self.provider, prompt_len, price)
    }

    /// Same breakdown, from the usage costs the backend actually reported.
    pub async fn breakdown_from_usage(&self, evaluation: Decimal, generation: Decimal, image: Decimal) -> CostBreakdown {
        let price = self.native_price().await;
        assemble(&self.table, evaluation, generation, image, price)
    }

    pub async fn estimate_battle(&self, mode: BattleMode, entry_fee: Decimal) -> BattleCostEstimate {
        let price = self.native_price().await;
        let ai_cost_usd = battle_ai_cost(&self.table, self.provider);
        let ai_cost_native = round_native(ai_cost_usd / price);
        BattleCostEstimate {
            mode,
            entry_fee,
            ai_cost_usd,
            ai_cost_native,
            total: entry_fee + ai_cost_native,
            native_price_usd: price,
        }
    }

    /// Rates of the provider this estimator was built for. Estimators may be
    /// built for `bedrock` to quote its rates even though no backend serves it.
    pub fn pricing_view(&self) -> PricingView {
        PricingView {
            provider: self.provider,
            pricing: *self.table.for_provider(self.provider),
            blockchain_usd: self.table.blockchain_usd,
            platform_markup: self.table.platform_markup,
            operations: vec![
                OperationSize {
                    operation: "prompt_evaluation",
                    input_tokens: EVAL_OVERHEAD_TOKENS,
                    output_tokens: EVAL_OUTPUT_TOKENS,
                },
                OperationSize {
                    operation: "persona_generation",
                    input_tokens: GENERATION_OVERHEAD_TOKENS,
                    output_tokens: GENERATION_OUTPUT_TOKENS,
                },
                OperationSize {
                    operation: "battle_argument",
                    input_tokens: ARGUMENT_INPUT_TOKENS,
                    output_tokens: ARGUMENT_OUTPUT_TOKENS,
                },
                OperationSize {
                    operation: "battle_judgment",
                    input_tokens: JUDGE_INPUT_TOKENS,
                    output_tokens: JUDGE_OUTPUT_TOKENS,
                },
            ],
        }
    }
}
