// Runtime configuration.
//
// `AppConfig` comes from the environment (a `.env` file is honoured).
// `EconomyConfig` holds every table the pure economic functions read. It is
// built once, validated, and shared read-only for the life of the process.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::battle::{RatingRules, RewardRules};
use crate::error::{ArenaError, ArenaResult};
use crate::gacha::TierTable;
use crate::pricing::{FeeSchedule, PricingTable, ProviderKind};

pub const DEFAULT_PORT: u16 = 1234;
pub const DEFAULT_STATE_PATH: &str = "data/state.json";
pub const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 60;

// ============================================================================
// ECONOMY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub tiers: TierTable,
    pub pricing: PricingTable,
    pub fees: FeeSchedule,
    pub rewards: RewardRules,
    pub rating: RatingRules,
}

impl EconomyConfig {
    /// Defaults, replaced section by section from `path` when given.
    pub fn load(path: Option<&Path>) -> ArenaResult<Self> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| ArenaError::config(format!("read {}: {}", path.display(), e)))?;
                serde_json::from_str(&json)
                    .map_err(|e| ArenaError::config(format!("parse {}: {}", path.display(), e)))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ArenaResult<()> {
        self.tiers.validate()?;
        self.pricing.validate()?;
        self.fees.validate()?;
        self.rewards.validate()?;
        self.rating.validate()?;
        Ok(())
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub ai: AiConfig,
    /// `None` runs settlement in mock mode
    pub settlement_rpc_url: Option<String>,
    pub price_feed_url: Option<String>,
    pub native_price_usd: Decimal,
    pub price_cache_ttl: Duration,
    pub economy_config_path: Option<PathBuf>,
    pub state_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> ArenaResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> ArenaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("ARENA_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ArenaError::config(format!("ARENA_PORT is not a port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let provider = ProviderKind::parse(&var("AI_PROVIDER").unwrap_or_else(|| "mock".to_string()))?;
        let api_key = provider.api_key_var().and_then(|key| var(key));

        let native_price_usd = match var("NATIVE_PRICE_USD") {
            Some(raw) => Decimal::from_str(&raw)
                .map_err(|_| ArenaError::config(format!("NATIVE_PRICE_USD is not a number: {}", raw)))?,
            None => dec!(150),
        };
        if native_price_usd <= Decimal::ZERO {
            return Err(ArenaError::config("NATIVE_PRICE_USD must be positive"));
        }

        let ttl_secs = match var("PRICE_CACHE_TTL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ArenaError::config(format!("PRICE_CACHE_TTL_SECS is not a number: {}", raw)))?,
            None => DEFAULT_PRICE_CACHE_TTL_SECS,
        };

        Ok(Self {
            port,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            ai: AiConfig { provider, api_key, base_url: var("AI_BASE_URL") },
            settlement_rpc_url: var("SETTLEMENT_RPC_URL"),
            price_feed_url: var("PRICE_FEED_URL"),
            native_price_usd,
            price_cache_ttl: Duration::from_secs(ttl_secs),
            economy_config_path: var("ECONOMY_CONFIG_PATH").map(PathBuf::from),
            state_path: var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
        })
    }
}
