/// Persona Arena economic resolution engine
/// Exports all modules for use as a library crate

pub mod ai;
pub mod app_state;
pub mod battle;
pub mod config;
pub mod cost;
pub mod creation;
pub mod error;
pub mod gacha;
pub mod handlers;
pub mod ledger;
pub mod marketplace;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod settlement;
pub mod store;

pub use ai::{AiBackend, AiProvider, JudgeResult, JudgeWinner, MockProvider, TokenUsage};
pub use battle::{calculate_rewards, rating_update, BattleEngine, CreateBattle, RatingRules, RewardRules};
pub use config::{AppConfig, EconomyConfig};
pub use cost::{BattleCostEstimate, CachedPriceSource, CostBreakdown, CostEstimator, PriceSource};
pub use creation::{CreatedPersona, CreationEngine, PromptEvaluation};
pub use error::{ArenaError, ArenaResult, ErrorKind};
pub use gacha::{classify_score, draw, roll_for_score, ScoreTier, TierProbabilities, TierTable};
pub use ledger::{Ledger, WalletView};
pub use marketplace::{split_sale, ListingFilter, MarketplaceEngine, MarketplaceStats};
pub use models::{
    Battle, BattleMode, BattleStatus, EarningType, Listing, ListingStatus, Persona, Rewards, SaleBreakdown, Tier,
    Traits, TxType, WalletTransaction, BASELINE_RATING,
};
pub use pricing::{FeeSchedule, PricingTable, ProviderKind};
pub use settlement::{L1SettlementClient, SettlementClient, TransferDirection, TransferReceipt};
pub use store::{MemoryStore, PersonaFilter, Repository};
