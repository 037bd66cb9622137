// Shared doubles and builders for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use persona_arena::ai::{
    DebateScores, Evaluation, GeneratedArgument, GeneratedImage, GeneratedPersona, JudgeHighlights, JudgeScoreCard,
    Judgment,
};
use persona_arena::app_state::AppState;
use persona_arena::models::PersonaContext;
use persona_arena::{
    AiProvider, ArenaError, ArenaResult, CachedPriceSource, CostBreakdown, CostEstimator, EconomyConfig,
    JudgeResult, JudgeWinner, L1SettlementClient, MemoryStore, MockProvider, Persona, PricingTable, ProviderKind,
    Repository, SettlementClient, Tier, TokenUsage, TransferDirection, TransferReceipt, Traits, BASELINE_RATING,
};

// ===== AI =====

/// Mock backend whose judge always names the same side.
pub struct ScriptedJudge {
    inner: MockProvider,
    winner: JudgeWinner,
    pub fail_judge: AtomicBool,
    pub judge_calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new(winner: JudgeWinner) -> Self {
        Self {
            inner: MockProvider::new(PricingTable::default().mock),
            winner,
            fail_judge: AtomicBool::new(false),
            judge_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AiProvider for ScriptedJudge {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation> {
        self.inner.evaluate(prompt).await
    }

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona> {
        self.inner.generate_persona(prompt, tier).await
    }

    async fn generate_argument(
        &self,
        persona: &PersonaContext,
        topic: &str,
        opponent_argument: Option<&str>,
    ) -> ArenaResult<GeneratedArgument> {
        self.inner.generate_argument(persona, topic, opponent_argument).await
    }

    async fn judge(
        &self,
        _topic: &str,
        _persona1: &PersonaContext,
        _argument1: &str,
        _persona2: &PersonaContext,
        _argument2: &str,
    ) -> ArenaResult<Judgment> {
        self.judge_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_judge.load(Ordering::SeqCst) {
            return Err(ArenaError::AiUnavailable("judge timed out".into()));
        }
        let strong = DebateScores { logical_coherence: 27, creativity: 22, persuasiveness: 22, topic_relevance: 18, total: 0 };
        let weak = DebateScores { logical_coherence: 20, creativity: 15, persuasiveness: 14, topic_relevance: 12, total: 0 };
        let (persona1, persona2) = match self.winner {
            JudgeWinner::Persona1 => (strong, weak),
            JudgeWinner::Persona2 => (weak, strong),
        };
        Ok(Judgment {
            result: JudgeResult {
                winner: self.winner,
                scores: JudgeScoreCard { persona1, persona2 },
                reasoning: "The winning side stayed on topic.".into(),
                highlights: JudgeHighlights::default(),
            },
            usage: TokenUsage { input_tokens: 1000, output_tokens: 800, total_cost: dec!(0.0018) },
        })
    }

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
        self.inner.generate_image(seed).await
    }
}

// ===== SETTLEMENT =====

/// Mock settlement that counts transfers, can be switched to fail and can
/// hold withdrawals in flight.
pub struct SwitchableSettlement {
    inner: L1SettlementClient,
    pub failing: AtomicBool,
    pub transfers: AtomicUsize,
    pub withdrawal_delay_ms: AtomicU64,
}

impl SwitchableSettlement {
    pub fn new() -> Self {
        Self {
            inner: L1SettlementClient::mock(),
            failing: AtomicBool::new(false),
            transfers: AtomicUsize::new(0),
            withdrawal_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delay_withdrawals(&self, delay: Duration) {
        self.withdrawal_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementClient for SwitchableSettlement {
    async fn transfer(
        &self,
        wallet_id: &str,
        amount: Decimal,
        direction: TransferDirection,
    ) -> ArenaResult<TransferReceipt> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArenaError::SettlementFailed("settlement endpoint unreachable".into()));
        }
        if matches!(direction, TransferDirection::Withdrawal { .. }) {
            let delay = self.withdrawal_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
        let receipt = self.inner.transfer(wallet_id, amount, direction).await?;
        self.transfers.fetch_add(1, Ordering::SeqCst);
        Ok(receipt)
    }

    async fn balance(&self, wallet_id: &str) -> ArenaResult<Decimal> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArenaError::SettlementFailed("settlement endpoint unreachable".into()));
        }
        self.inner.balance(wallet_id).await
    }
}

// ===== BUILDERS =====

pub fn persona(id: &str, owner: &str) -> Persona {
    Persona {
        id: id.to_string(),
        name: format!("Persona {}", id),
        description: "integration fixture".to_string(),
        personality: "measured".to_string(),
        skills: vec!["Rhetoric".to_string()],
        avatar_url: String::new(),
        tier: Tier::Epic,
        traits: Traits { intelligence: 70, creativity: 65, persuasion: 80, empathy: 50, technical: 40 },
        rating: BASELINE_RATING,
        battles_won: 0,
        battles_lost: 0,
        wounded: false,
        wounded_until: None,
        owner_id: owner.to_string(),
        owner_wallet: format!("{}-wallet", owner),
        creator_id: owner.to_string(),
        total_revenue: Decimal::ZERO,
        wallet_id: format!("wallet-{}", id),
        mint_address: format!("mint-{}", id),
        prompt_text: "integration fixture prompt".to_string(),
        prompt_score: 60,
        generation_cost: CostBreakdown::default(),
        created_at: Utc::now(),
    }
}

pub struct Arena {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

pub async fn arena(ai: Arc<dyn AiProvider>, settlement: Arc<dyn SettlementClient>) -> Arena {
    let store = Arc::new(MemoryStore::new());
    let economy = Arc::new(EconomyConfig::default());
    let costs = Arc::new(CostEstimator::new(
        economy.pricing.clone(),
        ProviderKind::Mock,
        CachedPriceSource::fixed(dec!(150)),
    ));
    let state = Arc::new(AppState::new(store.clone(), ai, settlement, costs, economy));
    Arena { state, store }
}

/// Arena seeded with persona A (owned by alice) and persona B (owned by bob).
pub async fn seeded_arena(ai: Arc<dyn AiProvider>, settlement: Arc<dyn SettlementClient>) -> Arena {
    let arena = arena(ai, settlement).await;
    arena.store.insert_persona(persona("A", "alice")).await.unwrap();
    arena.store.insert_persona(persona("B", "bob")).await.unwrap();
    arena
}
