// Application state shared by every handler

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::ai::{AiBackend, AiProvider};
use crate::battle::BattleEngine;
use crate::config::{AppConfig, EconomyConfig};
use crate::cost::{CachedPriceSource, CostEstimator, HttpPriceFeed, PriceSource, StaticPrice};
use crate::creation::CreationEngine;
use crate::error::ArenaResult;
use crate::ledger::Ledger;
use crate::marketplace::MarketplaceEngine;
use crate::settlement::{L1SettlementClient, SettlementClient};
use crate::store::MemoryStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub creation: CreationEngine,
    pub battles: BattleEngine,
    pub marketplace: MarketplaceEngine,
    pub ledger: Arc<Ledger>,
    pub costs: Arc<CostEstimator>,
    pub economy: Arc<EconomyConfig>,
    /// Snapshot target on shutdown; `None` keeps state in memory only
    pub state_path: Option<PathBuf>,
}

impl AppState {
    /// Wire the engines over already-built collaborators.
    pub fn new(
        store: Arc<MemoryStore>,
        ai: Arc<dyn AiProvider>,
        settlement: Arc<dyn SettlementClient>,
        costs: Arc<CostEstimator>,
        economy: Arc<EconomyConfig>,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(store.clone(), settlement));
        let creation = CreationEngine::new(store.clone(), ai.clone(), costs.clone(), economy.clone());
        let battles = BattleEngine::new(store.clone(), ai, ledger.clone(), costs.clone(), economy.clone());
        let marketplace = MarketplaceEngine::new(store.clone(), ledger.clone(), economy.fees);

        Self { store, creation, battles, marketplace, ledger, costs, economy, state_path: None }
    }

    /// Build everything the binary needs from configuration.
    pub async fn from_config(config: &AppConfig, economy: EconomyConfig) -> ArenaResult<Self> {
        let ai: Arc<dyn AiProvider> = Arc::new(AiBackend::from_config(&config.ai, &economy.pricing)?);

        let settlement = L1SettlementClient::new(config.settlement_rpc_url.clone());
        settlement.log_status();

        let feed: Arc<dyn PriceSource> = match &config.price_feed_url {
            Some(url) => Arc::new(HttpPriceFeed::new(url.clone())),
            None => Arc::new(StaticPrice(config.native_price_usd)),
        };
        let prices = CachedPriceSource::new(feed, config.price_cache_ttl, config.native_price_usd);
        let costs = Arc::new(CostEstimator::new(economy.pricing.clone(), config.ai.provider, prices));

        let store = Arc::new(MemoryStore::load_from_path(&config.state_path).await?);

        let mut state = Self::new(store, ai, Arc::new(settlement), costs, Arc::new(economy));
        state.state_path = Some(config.state_path.clone());

        info!(provider = %config.ai.provider, "persona arena initialised");
        Ok(state)
    }

    pub async fn save_to_disk(&self) -> ArenaResult<()> {
        match &self.state_path {
            Some(path) => self.store.save_to_path(path).await,
            None => Ok(()),
        }
    }
}
