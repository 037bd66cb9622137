// ============================================================================
// Battle Engine
// ============================================================================
//
// Flow: create (PENDING) → start (ARGUING) → judge (COMPLETED)
//
// Every transition runs under the battle's entity lock and lands through a
// conditional store update keyed on the expected prior status. External calls
// (AI, settlement) happen before the commit; if any of them fails nothing is
// written and the same call may be retried.
//
// ============================================================================

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info};

use super::rating::{rating_update, RatingUpdate};
use super::rewards::calculate_rewards;
use crate::ai::{AiProvider, BattleArgument, JudgeResult, JudgeWinner};
use crate::config::EconomyConfig;
use crate::cost::{BattleCostEstimate, CostEstimator};
use crate::error::{ArenaError, ArenaResult};
use crate::ledger::Ledger;
use crate::models::{Battle, BattleMode, BattleStatus, EarningType, Persona, Rewards, WalletTransaction};
use crate::pricing::round_usd;
use crate::store::{EntityLocks, JudgmentCommit, PersonaOutcome, Repository, WoundUpdate, DEFAULT_PAGE_SIZE};

/// Default page size of a persona's battle history.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBattle {
    pub persona1_id: String,
    pub persona2_id: String,
    pub mode: BattleMode,
    pub topic: String,
    pub initiator_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub battle: Battle,
    pub persona1_argument: BattleArgument,
    pub persona2_argument: BattleArgument,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeOutcome {
    pub battle: Battle,
    pub winner_id: String,
    pub loser_id: String,
    pub rewards: Rewards,
    pub rating: RatingUpdate,
    /// Winner payout deposit, absent when the payout is zero
    pub deposit: Option<WalletTransaction>,
}

/// SHA-256 of the judge payload as persisted.
pub fn judge_digest(result: &JudgeResult) -> ArenaResult<String> {
    let bytes = serde_json::to_vec(result)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

pub struct BattleEngine {
    repo: Arc<dyn Repository>,
    ai: Arc<dyn AiProvider>,
    ledger: Arc<Ledger>,
    costs: Arc<CostEstimator>,
    economy: Arc<EconomyConfig>,
    locks: EntityLocks,
}

impl BattleEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        ai: Arc<dyn AiProvider>,
        ledger: Arc<Ledger>,
        costs: Arc<CostEstimator>,
        economy: Arc<EconomyConfig>,
    ) -> Self {
        Self { repo, ai, ledger, costs, economy, locks: EntityLocks::new() }
    }

    async fn load_pair(&self, persona1_id: &str, persona2_id: &str) -> ArenaResult<(Persona, Persona)> {
        tokio::try_join!(
            self.repo.get_persona_required(persona1_id),
            self.repo.get_persona_required(persona2_id),
        )
    }

    pub async fn create(&self, request: CreateBattle) -> ArenaResult<Battle> {
        if request.topic.trim().is_empty() {
            return Err(ArenaError::invalid_input("battle topic is required"));
        }
        if request.persona1_id == request.persona2_id {
            return Err(ArenaError::invalid_input("a persona cannot battle itself"));
        }

        let (p1, p2) = self.load_pair(&request.persona1_id, &request.persona2_id).await?;
        let now = Utc::now();
        for persona in [&p1, &p2] {
            if persona.is_wounded_at(now) {
                return Err(ArenaError::invalid_state(format!(
                    "persona {} is wounded until {}",
                    persona.id,
                    persona
                        .wounded_until
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "further notice".to_string())
                )));
            }
        }

        let battle = Battle {
            id: uuid::Uuid::new_v4().to_string(),
            mode: request.mode,
            topic: request.topic.trim().to_string(),
            persona1_id: p1.id,
            persona2_id: p2.id,
            initiator_id: request.initiator_id,
            status: BattleStatus::Pending,
            persona1_argument: None,
            persona2_argument: None,
            winner_id: None,
            judge_result: None,
            judge_digest: None,
            entry_fee: self.economy.rewards.entry_fees.for_mode(request.mode),
            winner_reward: Decimal::ZERO,
            rewards: None,
            ai_cost: Decimal::ZERO,
            created_at: now,
            completed_at: None,
        };
        self.repo.insert_battle(battle.clone()).await?;

        info!(
            battle_id = %battle.id,
            mode = %battle.mode,
            entry_fee = %battle.entry_fee,
            persona1 = %battle.persona1_id,
            persona2 = %battle.persona2_id,
            "battle created"
        );
        Ok(battle)
    }

    pub async fn start(&self, battle_id: &str) -> ArenaResult<StartOutcome> {
        let _guard = self.locks.acquire(battle_id).await;

        let battle = self.repo.get_battle_required(battle_id).await?;
        if battle.status != BattleStatus::Pending {
            return Err(ArenaError::invalid_state(format!(
                "battle {} is {}, start requires PENDING",
                battle_id, battle.status
            )));
        }

        let (p1, p2) = self.load_pair(&battle.persona1_id, &battle.persona2_id).await?;
        let (ctx1, ctx2) = (p1.context(), p2.context());
        let (arg1, arg2) = tokio::try_join!(
            self.ai.generate_argument(&ctx1, &battle.topic, None),
            self.ai.generate_argument(&ctx2, &battle.topic, None),
        )?;
        arg1.validate()?;
        arg2.validate()?;

        let ai_cost = round_usd(arg1.usage.total_cost + arg2.usage.total_cost);
        let battle = self
            .repo
            .commit_start(
                battle_id,
                arg1.argument.argument.clone(),
                arg2.argument.argument.clone(),
                ai_cost,
            )
            .await?;

        info!(battle_id = %battle_id, ai_cost = %ai_cost, "battle started");
        Ok(StartOutcome { battle, persona1_argument: arg1.argument, persona2_argument: arg2.argument })
    }

    pub async fn judge(&self, battle_id: &str) -> ArenaResult<JudgeOutcome> {
        let _guard = self.locks.acquire(battle_id).await;

        let battle = self.repo.get_battle_required(battle_id).await?;
        if battle.status.is_terminal() {
            return Err(ArenaError::invalid_state(format!("battle {} has already been judged", battle_id)));
        }
        if battle.status != BattleStatus::Arguing {
            return Err(ArenaError::invalid_state(format!(
                "battle {} is {}, judge requires ARGUING",
                battle_id, battle.status
            )));
        }
        let (Some(argument1), Some(argument2)) = (&battle.persona1_argument, &battle.persona2_argument) else {
            return Err(ArenaError::invalid_state(format!("battle {} is missing arguments", battle_id)));
        };

        let (p1, p2) = self.load_pair(&battle.persona1_id, &battle.persona2_id).await?;
        let judgment = self
            .ai
            .judge(&battle.topic, &p1.context(), argument1, &p2.context(), argument2)
            .await?;
        let result = judgment.result.normalized()?;

        let (winner, loser) = match result.winner {
            JudgeWinner::Persona1 => (&p1, &p2),
            JudgeWinner::Persona2 => (&p2, &p1),
        };
        let rewards = calculate_rewards(battle.mode, battle.entry_fee, &self.economy.rewards);
        let now = Utc::now();
        let rating = rating_update(battle.mode, now, &self.economy.rating)?;

        let deposit = if rewards.winner > Decimal::ZERO {
            Some(
                self.ledger
                    .settle_deposit(winner, rewards.winner, EarningType::Battle, Some(battle.id.clone()))
                    .await?,
            )
        } else {
            None
        };

        let digest = judge_digest(&result)?;
        let ai_cost = battle.ai_cost + round_usd(judgment.usage.total_cost);
        let completed = Battle {
            status: BattleStatus::Completed,
            winner_id: Some(winner.id.clone()),
            judge_result: Some(result),
            judge_digest: Some(digest),
            winner_reward: rewards.winner,
            rewards: Some(rewards),
            ai_cost,
            completed_at: Some(now),
            ..battle.clone()
        };

        let commit = JudgmentCommit {
            battle: completed.clone(),
            winner: PersonaOutcome {
                persona_id: winner.id.clone(),
                rating_delta: rating.winner_delta,
                won: true,
                wound: WoundUpdate::Keep,
            },
            loser: PersonaOutcome {
                persona_id: loser.id.clone(),
                rating_delta: rating.loser_delta,
                won: false,
                wound: rating.loser_wound(),
            },
            deposit: deposit.clone(),
        };
        if let Err(e) = self.repo.commit_judgment(commit).await {
            if let Some(tx) = &deposit {
                error!(
                    battle_id = %battle_id,
                    receipt = %tx.receipt_id,
                    amount = %tx.amount,
                    error = %e,
                    "winner payout settled but judgment commit failed; needs reconciliation"
                );
            }
            return Err(e);
        }

        info!(
            battle_id = %battle_id,
            winner = %winner.id,
            loser = %loser.id,
            reward = %rewards.winner,
            platform = %rewards.platform,
            "battle judged"
        );
        Ok(JudgeOutcome {
            battle: completed,
            winner_id: winner.id.clone(),
            loser_id: loser.id.clone(),
            rewards,
            rating,
            deposit,
        })
    }

    pub async fn get(&self, battle_id: &str) -> ArenaResult<Battle> {
        self.repo.get_battle_required(battle_id).await
    }

    /// Battles the persona took part in, on either side, newest first.
    pub async fn history(&self, persona_id: &str, limit: Option<usize>) -> ArenaResult<Vec<Battle>> {
        self.repo.get_persona_required(persona_id).await?;
        self.repo
            .battles_for_persona(persona_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }

    pub async fn leaderboard(&self, limit: Option<usize>) -> ArenaResult<Vec<Persona>> {
        self.repo.leaderboard(limit.unwrap_or(DEFAULT_PAGE_SIZE)).await
    }

    pub async fn estimate_cost(&self, mode: BattleMode) -> BattleCostEstimate {
        let entry_fee = self.economy.rewards.entry_fees.for_mode(mode);
        self.costs.estimate_battle(mode, entry_fee).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ai::{
        DebateScores, Evaluation, GeneratedArgument, GeneratedImage, GeneratedPersona, JudgeHighlights,
        JudgeScoreCard, Judgment, MockProvider, TokenUsage,
    };
    use crate::cost::CachedPriceSource;
    use crate::ledger::tests::FailingSettlement;
    use crate::models::{PersonaContext, Tier, BASELINE_RATING};
    use crate::pricing::{PricingTable, ProviderKind};
    use crate::settlement::{L1SettlementClient, SettlementClient};
    use crate::store::tests::persona_fixture;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Mock backend with a fixed verdict and switchable failures.
    pub(crate) struct ScriptedAi {
        inner: MockProvider,
        winner: JudgeWinner,
        pub fail_arguments: AtomicBool,
        pub fail_judge: AtomicBool,
        pub judge_calls: AtomicUsize,
    }

    impl ScriptedAi {
        pub(crate) fn new(winner: JudgeWinner) -> Self {
            Self {
                inner: MockProvider::new(PricingTable::default().mock),
                winner,
                fail_arguments: AtomicBool::new(false),
                fail_judge: AtomicBool::new(false),
                judge_calls: AtomicUsize::new(0),
            }
        }
    }

    fn scores(logical: u32, creativity: u32, persuasion: u32, relevance: u32) -> DebateScores {
        DebateScores {
            logical_coherence: logical,
            creativity,
            persuasiveness: persuasion,
            topic_relevance: relevance,
            total: 0,
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedAi {
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
            if self.fail_arguments.load(Ordering::SeqCst) {
                return Err(ArenaError::AiUnavailable("argument backend down".into()));
            }
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
                return Err(ArenaError::AiUnavailable("judge backend down".into()));
            }
            // 85 vs 60
            let (strong, weak) = (scores(26, 21, 21, 17), scores(18, 15, 15, 12));
            let (persona1, persona2) = match self.winner {
                JudgeWinner::Persona1 => (strong, weak),
                JudgeWinner::Persona2 => (weak, strong),
            };
            Ok(Judgment {
                result: JudgeResult {
                    winner: self.winner,
                    scores: JudgeScoreCard { persona1, persona2 },
                    reasoning: "scripted".into(),
                    highlights: JudgeHighlights::default(),
                },
                usage: TokenUsage { input_tokens: 1000, output_tokens: 800, total_cost: dec!(0.0018) },
            })
        }

        async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
            self.inner.generate_image(seed).await
        }
    }

    struct Harness {
        engine: BattleEngine,
        store: Arc<MemoryStore>,
        ai: Arc<ScriptedAi>,
    }

    async fn harness(winner: JudgeWinner, settlement: Arc<dyn SettlementClient>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.insert_persona(persona_fixture("p1", "alice")).await.unwrap();
        store.insert_persona(persona_fixture("p2", "bob")).await.unwrap();

        let ai = Arc::new(ScriptedAi::new(winner));
        let economy = Arc::new(EconomyConfig::default());
        let ledger = Arc::new(Ledger::new(store.clone(), settlement));
        let costs = Arc::new(CostEstimator::new(
            economy.pricing.clone(),
            ProviderKind::Mock,
            CachedPriceSource::fixed(dec!(150)),
        ));
        let engine = BattleEngine::new(store.clone(), ai.clone(), ledger, costs, economy);
        Harness { engine, store, ai }
    }

    fn request(mode: BattleMode) -> CreateBattle {
        CreateBattle {
            persona1_id: "p1".into(),
            persona2_id: "p2".into(),
            mode,
            topic: "Is a hot dog a sandwich?".into(),
            initiator_id: "alice".into(),
        }
    }

    #[tokio::test]
    async fn test_create_sets_entry_fee_and_pending() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Deathmatch)).await.unwrap();
        assert_eq!(battle.status, BattleStatus::Pending);
        assert_eq!(battle.entry_fee, dec!(2));
    }

    #[tokio::test]
    async fn test_create_rejects_wounded_and_missing() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let mut wounded = persona_fixture("p3", "carol");
        wounded.wounded = true;
        wounded.wounded_until = Some(Utc::now() + chrono::Duration::days(3));
        h.store.insert_persona(wounded).await.unwrap();

        let mut req = request(BattleMode::Casual);
        req.persona2_id = "p3".into();
        assert!(matches!(h.engine.create(req).await, Err(ArenaError::InvalidState(_))));

        let mut req = request(BattleMode::Casual);
        req.persona2_id = "ghost".into();
        assert!(matches!(h.engine.create(req).await, Err(ArenaError::NotFound { .. })));

        let mut req = request(BattleMode::Casual);
        req.persona2_id = "p1".into();
        assert!(matches!(h.engine.create(req).await, Err(ArenaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_start_failure_keeps_pending() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Ranked)).await.unwrap();

        h.ai.fail_arguments.store(true, Ordering::SeqCst);
        let err = h.engine.start(&battle.id).await.unwrap_err();
        assert!(err.is_retryable());
        let stored = h.engine.get(&battle.id).await.unwrap();
        assert_eq!(stored.status, BattleStatus::Pending);
        assert!(stored.persona1_argument.is_none());

        h.ai.fail_arguments.store(false, Ordering::SeqCst);
        let started = h.engine.start(&battle.id).await.unwrap();
        assert_eq!(started.battle.status, BattleStatus::Arguing);
        assert!(started.battle.has_arguments());
    }

    #[tokio::test]
    async fn test_judge_requires_arguing() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Ranked)).await.unwrap();
        assert!(matches!(h.engine.judge(&battle.id).await, Err(ArenaError::InvalidState(_))));
        assert_eq!(h.ai.judge_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_judge_failure_keeps_arguing() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Ranked)).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();

        h.ai.fail_judge.store(true, Ordering::SeqCst);
        assert!(h.engine.judge(&battle.id).await.is_err());
        assert_eq!(h.engine.get(&battle.id).await.unwrap().status, BattleStatus::Arguing);
        assert_eq!(h.store.get_persona_required("p1").await.unwrap().rating, BASELINE_RATING);
    }

    #[tokio::test]
    async fn test_settlement_failure_keeps_arguing() {
        let h = harness(JudgeWinner::Persona2, Arc::new(FailingSettlement)).await;
        let battle = h.engine.create(request(BattleMode::Deathmatch)).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();

        let err = h.engine.judge(&battle.id).await.unwrap_err();
        assert!(matches!(err, ArenaError::SettlementFailed(_)));
        assert_eq!(h.engine.get(&battle.id).await.unwrap().status, BattleStatus::Arguing);
        assert!(h.store.transactions_for("p2").await.unwrap().is_empty());
        assert_eq!(h.store.get_persona_required("p1").await.unwrap().battles_lost, 0);
    }

    #[tokio::test]
    async fn test_casual_judgment_needs_no_settlement() {
        let h = harness(JudgeWinner::Persona2, Arc::new(FailingSettlement)).await;
        let battle = h.engine.create(request(BattleMode::Casual)).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();

        let outcome = h.engine.judge(&battle.id).await.unwrap();
        assert_eq!(outcome.winner_id, "p2");
        assert!(outcome.deposit.is_none());
        let loser = h.store.get_persona_required("p1").await.unwrap();
        assert_eq!(loser.rating, BASELINE_RATING - 20);
        assert!(!loser.wounded);
    }

    #[tokio::test]
    async fn test_completed_is_terminal() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Ranked)).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();
        let outcome = h.engine.judge(&battle.id).await.unwrap();
        assert_eq!(outcome.battle.status, BattleStatus::Completed);
        assert_eq!(outcome.battle.judge_digest, Some(judge_digest(outcome.battle.judge_result.as_ref().unwrap()).unwrap()));

        assert!(matches!(h.engine.start(&battle.id).await, Err(ArenaError::InvalidState(_))));
        assert!(matches!(h.engine.judge(&battle.id).await, Err(ArenaError::InvalidState(_))));
        assert_eq!(h.store.transactions_for("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_judges_settle_once() {
        let h = Arc::new(harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await);
        let battle = h.engine.create(request(BattleMode::Deathmatch)).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();

        let (a, b) = tokio::join!(h.engine.judge(&battle.id), h.engine.judge(&battle.id));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let txs = h.store.transactions_for("p1").await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, dec!(3.2));
        assert_eq!(h.store.get_persona_required("p1").await.unwrap().rating, BASELINE_RATING + 10);
    }

    #[tokio::test]
    async fn test_expired_wound_is_kept_by_winner() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let expired = Utc::now() - chrono::Duration::days(1);
        let mut healed = persona_fixture("p4", "dave");
        healed.wounded = true;
        healed.wounded_until = Some(expired);
        h.store.insert_persona(healed).await.unwrap();

        let mut req = request(BattleMode::Casual);
        req.persona1_id = "p4".into();
        let battle = h.engine.create(req).await.unwrap();
        h.engine.start(&battle.id).await.unwrap();
        let outcome = h.engine.judge(&battle.id).await.unwrap();
        assert_eq!(outcome.winner_id, "p4");

        let winner = h.store.get_persona_required("p4").await.unwrap();
        assert_eq!(winner.rating, BASELINE_RATING + 10);
        assert!(winner.wounded);
        assert_eq!(winner.wounded_until, Some(expired));
    }

    #[tokio::test]
    async fn test_ai_cost_accumulates() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let battle = h.engine.create(request(BattleMode::Casual)).await.unwrap();
        let started = h.engine.start(&battle.id).await.unwrap();
        // mock arguments: 300 in + 500 out at 0.001 per 1000, twice
        assert_eq!(started.battle.ai_cost, dec!(0.0016));
        let judged = h.engine.judge(&battle.id).await.unwrap();
        assert_eq!(judged.battle.ai_cost, dec!(0.0034));
    }

    #[tokio::test]
    async fn test_estimate_cost_uses_entry_fee_table() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        let estimate = h.engine.estimate_cost(BattleMode::Ranked).await;
        assert_eq!(estimate.entry_fee, dec!(0.5));
        assert!(estimate.total > estimate.entry_fee);
    }

    #[tokio::test]
    async fn test_oversized_cooldown_fails_judge_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        store.insert_persona(persona_fixture("p1", "alice")).await.unwrap();
        store.insert_persona(persona_fixture("p2", "bob")).await.unwrap();
        let mut economy = EconomyConfig::default();
        economy.rating.wound_days = 200_000_000;
        let economy = Arc::new(economy);
        let ledger = Arc::new(Ledger::new(store.clone(), Arc::new(L1SettlementClient::mock())));
        let costs = Arc::new(CostEstimator::new(
            economy.pricing.clone(),
            ProviderKind::Mock,
            CachedPriceSource::fixed(dec!(150)),
        ));
        let engine = BattleEngine::new(store.clone(), Arc::new(ScriptedAi::new(JudgeWinner::Persona1)), ledger, costs, economy);

        let battle = engine.create(request(BattleMode::Ranked)).await.unwrap();
        engine.start(&battle.id).await.unwrap();
        let err = engine.judge(&battle.id).await.unwrap_err();
        assert!(matches!(err, ArenaError::Configuration(_)));
        assert_eq!(engine.get(&battle.id).await.unwrap().status, BattleStatus::Arguing);
        assert!(store.transactions_for("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_lists_both_sides_newest_first() {
        let h = harness(JudgeWinner::Persona1, Arc::new(L1SettlementClient::mock())).await;
        h.store.insert_persona(persona_fixture("p3", "carol")).await.unwrap();

        let first = h.engine.create(request(BattleMode::Casual)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut req = request(BattleMode::Casual);
        req.persona1_id = "p3".into();
        let second = h.engine.create(req).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut req = request(BattleMode::Casual);
        req.persona2_id = "p3".into();
        let third = h.engine.create(req).await.unwrap();

        let history = h.engine.history("p2", None).await.unwrap();
        assert_eq!(history.iter().map(|b| b.id.clone()).collect::<Vec<_>>(), vec![second.id.clone(), first.id.clone()]);
        assert_eq!(h.engine.history("p3", Some(1)).await.unwrap()[0].id, third.id);
        assert!(matches!(h.engine.history("ghost", None).await, Err(ArenaError::NotFound { .. })));
    }
}

