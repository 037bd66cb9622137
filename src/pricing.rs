//! Pricing table: provider costs, marketplace fee rates and money rounding.
//!
//! Everything here is static configuration. It is loaded once at startup,
//! validated, and then only ever read.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArenaError, ArenaResult};

// ============================================================================
// MONEY
// ============================================================================

/// Native currency precision (lamports).
pub const NATIVE_DECIMALS: u32 = 9;

/// Precision kept for USD cost figures.
pub const USD_DECIMALS: u32 = 8;

/// Round a native-currency amount, half to even.
pub fn round_native(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(NATIVE_DECIMALS, RoundingStrategy::MidpointNearestEven)
}

/// Round a USD figure, half to even.
pub fn round_usd(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(USD_DECIMALS, RoundingStrategy::MidpointNearestEven)
}

fn is_rate(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}

// ============================================================================
// AI PROVIDERS
// ============================================================================

/// Backend selected by `AI_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Bedrock,
    OpenAi,
    Gemini,
    Grok,
    DeepSeek,
    OpenRouter,
    Mock,
}

impl ProviderKind {
    pub fn parse(value: &str) -> ArenaResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "bedrock" => Ok(ProviderKind::Bedrock),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "grok" => Ok(ProviderKind::Grok),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(ArenaError::config(format!("Unsupported AI provider: {}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Grok => "grok",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Mock => "mock",
        }
    }

    /// Environment variable holding this backend's API key, if it needs one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Grok => Some("GROK_API_KEY"),
            ProviderKind::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderKind::Bedrock | ProviderKind::Mock => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// USD per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRate {
    pub input: Decimal,
    pub output: Decimal,
}

impl TokenRate {
    pub const fn new(input: Decimal, output: Decimal) -> Self {
        Self { input, output }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> Decimal {
        let thousand = dec!(1000);
        Decimal::from(input_tokens) / thousand * self.input
            + Decimal::from(output_tokens) / thousand * self.output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPricing {
    /// Cheap model used to score prompts
    pub evaluation: TokenRate,
    /// Model used for persona content, arguments and judging
    pub text: TokenRate,
    /// USD per generated image
    pub image: Decimal,
}

impl ProviderPricing {
    fn validate(&self, name: &str) -> ArenaResult<()> {
        let values = [
            self.evaluation.input,
            self.evaluation.output,
            self.text.input,
            self.text.output,
            self.image,
        ];
        if values.iter().any(|v| v.is_sign_negative()) {
            return Err(ArenaError::config(format!("Negative price in {} pricing", name)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
    /// Quoting only. No Bedrock client ships, so `AiBackend::from_config`
    /// refuses it and live creations never bill at these rates.
    pub bedrock: ProviderPricing,
    pub openai: ProviderPricing,
    pub gemini: ProviderPricing,
    pub mock: ProviderPricing,
    /// Fixed on-chain cost of minting a persona, USD
    pub blockchain_usd: Decimal,
    /// Platform markup on the creation subtotal
    pub platform_markup: Decimal,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            bedrock: ProviderPricing {
                evaluation: TokenRate::new(dec!(0.00025), dec!(0.00125)),
                text: TokenRate::new(dec!(0.003), dec!(0.015)),
                image: dec!(0.008),
            },
            openai: ProviderPricing {
                evaluation: TokenRate::new(dec!(0.0005), dec!(0.0015)),
                text: TokenRate::new(dec!(0.01), dec!(0.03)),
                image: dec!(0.04),
            },
            gemini: ProviderPricing {
                evaluation: TokenRate::new(dec!(0.00025), dec!(0.0005)),
                text: TokenRate::new(dec!(0.00025), dec!(0.0005)),
                image: Decimal::ZERO,
            },
            mock: ProviderPricing {
                evaluation: TokenRate::new(dec!(0.0001), dec!(0.0001)),
                text: TokenRate::new(dec!(0.001), dec!(0.001)),
                image: dec!(0.001),
            },
            blockchain_usd: dec!(0.002),
            platform_markup: dec!(0.1),
        }
    }
}

impl PricingTable {
    /// OpenAI-compatible backends are billed at OpenAI rates.
    pub fn for_provider(&self, kind: ProviderKind) -> &ProviderPricing {
        match kind {
            ProviderKind::Bedrock => &self.bedrock,
            ProviderKind::OpenAi | ProviderKind::Grok | ProviderKind::DeepSeek | ProviderKind::OpenRouter => {
                &self.openai
            }
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Mock => &self.mock,
        }
    }

    pub fn validate(&self) -> ArenaResult<()> {
        self.bedrock.validate("bedrock")?;
        self.openai.validate("openai")?;
        self.gemini.validate("gemini")?;
        self.mock.validate("mock")?;
        if self.blockchain_usd.is_sign_negative() {
            return Err(ArenaError::config("Negative blockchain cost"));
        }
        if !is_rate(self.platform_markup) {
            return Err(ArenaError::config("Platform markup must be within [0, 1]"));
        }
        Ok(())
    }
}

// ============================================================================
// MARKETPLACE FEES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub platform_fee_rate: Decimal,
    pub creator_royalty_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_fee_rate: dec!(0.025),
            creator_royalty_rate: dec!(0.05),
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> ArenaResult<()> {
        if !is_rate(self.platform_fee_rate) || !is_rate(self.creator_royalty_rate) {
            return Err(ArenaError::config("Marketplace fee rates must be within [0, 1]"));
        }
        if self.platform_fee_rate + self.creator_royalty_rate >= Decimal::ONE {
            return Err(ArenaError::config("Marketplace fees leave nothing for the seller"));
        }
        Ok(())
    }
}
