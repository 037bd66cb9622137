//! Repository capability and the in-memory store behind it.
//!
//! Engines never read-modify-write entities on their own. Every state change
//! goes through one of the conditional primitives below, which check the
//! expected prior status and apply the whole change under a single write
//! lock, so a racing caller sees `InvalidState` instead of a double
//! settlement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::info;

use crate::error::{ArenaError, ArenaResult};
use crate::models::{
    Battle, BattleStatus, Listing, ListingStatus, Persona, SaleBreakdown, Tier, TxType, WalletTransaction,
};

// ============================================================================
// COMMIT PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WoundUpdate {
    Keep,
    Clear,
    Until(DateTime<Utc>),
}

/// Battle result for one persona, applied as a delta at commit time.
#[derive(Debug, Clone)]
pub struct PersonaOutcome {
    pub persona_id: String,
    pub rating_delta: i64,
    pub won: bool,
    pub wound: WoundUpdate,
}

#[derive(Debug, Clone)]
pub struct JudgmentCommit {
    /// The battle as it should read once completed
    pub battle: Battle,
    pub winner: PersonaOutcome,
    pub loser: PersonaOutcome,
    pub deposit: Option<WalletTransaction>,
}

#[derive(Debug, Clone)]
pub struct SaleCommit {
    pub listing_id: String,
    pub buyer_id: String,
    pub buyer_wallet: String,
    pub breakdown: SaleBreakdown,
    pub sold_at: DateTime<Utc>,
    pub deposit: WalletTransaction,
}

#[derive(Debug, Clone, Default)]
pub struct PersonaFilter {
    pub tier: Option<Tier>,
    pub owner_id: Option<String>,
    pub limit: Option<usize>,
}

pub const DEFAULT_PAGE_SIZE: usize = 50;

// ============================================================================
// CAPABILITY
// ============================================================================

#[async_trait]
pub trait Repository: Send + Sync {
    // ----- personas -----

    async fn insert_persona(&self, persona: Persona) -> ArenaResult<()>;

    async fn get_persona(&self, id: &str) -> ArenaResult<Option<Persona>>;

    async fn get_persona_required(&self, id: &str) -> ArenaResult<Persona> {
        self.get_persona(id)
            .await?
            .ok_or_else(|| ArenaError::not_found("Persona", id))
    }

    /// Newest first.
    async fn list_personas(&self, filter: &PersonaFilter) -> ArenaResult<Vec<Persona>>;

    /// Highest rating first.
    async fn leaderboard(&self, limit: usize) -> ArenaResult<Vec<Persona>>;

    // ----- battles -----

    async fn insert_battle(&self, battle: Battle) -> ArenaResult<()>;

    async fn get_battle(&self, id: &str) -> ArenaResult<Option<Battle>>;

    async fn get_battle_required(&self, id: &str) -> ArenaResult<Battle> {
        self.get_battle(id)
            .await?
            .ok_or_else(|| ArenaError::not_found("Battle", id))
    }

    /// Battles either side of which is `persona_id`, newest first.
    async fn battles_for_persona(&self, persona_id: &str, limit: usize) -> ArenaResult<Vec<Battle>>;

    /// Replace the battle only while its stored status is `expected`.
    async fn update_battle_if(&self, battle: &Battle, expected: BattleStatus) -> ArenaResult<()>;

    /// Pending → Arguing with both arguments.
    async fn commit_start(
        &self,
        battle_id: &str,
        persona1_argument: String,
        persona2_argument: String,
        ai_cost: Decimal,
    ) -> ArenaResult<Battle> {
        let mut battle = self.get_battle_required(battle_id).await?;
        if battle.status != BattleStatus::Pending {
            return Err(ArenaError::invalid_state(format!(
                "battle {} is {}, expected PENDING",
                battle_id, battle.status
            )));
        }
        battle.persona1_argument = Some(persona1_argument);
        battle.persona2_argument = Some(persona2_argument);
        battle.ai_cost += ai_cost;
        battle.status = BattleStatus::Arguing;
        self.update_battle_if(&battle, BattleStatus::Pending).await?;
        Ok(battle)
    }

    /// Arguing → Completed, both persona outcomes and the optional deposit,
    /// all or nothing.
    async fn commit_judgment(&self, commit: JudgmentCommit) -> ArenaResult<()>;

    // ----- listings -----

    /// Fails with `AlreadyListed` if the persona has an active listing.
    async fn insert_listing_exclusive(&self, listing: Listing) -> ArenaResult<()>;

    async fn get_listing(&self, id: &str) -> ArenaResult<Option<Listing>>;

    async fn get_listing_required(&self, id: &str) -> ArenaResult<Listing> {
        self.get_listing(id)
            .await?
            .ok_or_else(|| ArenaError::not_found("Listing", id))
    }

    async fn list_listings(&self, status: Option<ListingStatus>) -> ArenaResult<Vec<Listing>>;

    async fn cancel_listing_if_active(&self, listing_id: &str, now: DateTime<Utc>) -> ArenaResult<Listing>;

    /// Active → Sold, ownership transfer and the seller deposit, all or nothing.
    async fn commit_sale(&self, commit: SaleCommit) -> ArenaResult<Listing>;

    // ----- wallet transactions -----

    /// Append a withdrawal while `expected_owner` still owns the persona and
    /// the recorded balance covers it.
    async fn commit_withdrawal(&self, tx: WalletTransaction, expected_owner: &str) -> ArenaResult<()>;

    /// Append a deposit and credit the persona's revenue.
    async fn commit_deposit(&self, tx: WalletTransaction) -> ArenaResult<()>;

    /// Full history, oldest first.
    async fn transactions_for(&self, persona_id: &str) -> ArenaResult<Vec<WalletTransaction>>;
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    personas: HashMap<String, Persona>,
    battles: HashMap<String, Battle>,
    listings: HashMap<String, Listing>,
    transactions: Vec<WalletTransaction>,
}

impl StoreData {
    fn persona_mut(&mut self, id: &str) -> ArenaResult<&mut Persona> {
        self.personas
            .get_mut(id)
            .ok_or_else(|| ArenaError::not_found("Persona", id))
    }

    fn check_deposit(&self, tx: &WalletTransaction) -> ArenaResult<()> {
        if tx.tx_type != TxType::Deposit || tx.amount <= Decimal::ZERO {
            return Err(ArenaError::invalid_input("deposit must be a positive DEPOSIT transaction"));
        }
        if !self.personas.contains_key(&tx.persona_id) {
            return Err(ArenaError::not_found("Persona", &tx.persona_id));
        }
        Ok(())
    }

    /// Caller has run `check_deposit`.
    fn apply_deposit(&mut self, tx: WalletTransaction) -> ArenaResult<()> {
        let persona = self.persona_mut(&tx.persona_id)?;
        persona.total_revenue += tx.amount;
        self.transactions.push(tx);
        Ok(())
    }

    /// Deposits minus withdrawals.
    fn balance_of(&self, persona_id: &str) -> Decimal {
        self.transactions
            .iter()
            .filter(|tx| tx.persona_id == persona_id)
            .fold(Decimal::ZERO, |acc, tx| match tx.tx_type {
                TxType::Deposit => acc + tx.amount,
                TxType::Withdrawal => acc - tx.amount,
            })
    }

    fn apply_outcome(&mut self, outcome: &PersonaOutcome) -> ArenaResult<()> {
        let persona = self.persona_mut(&outcome.persona_id)?;
        persona.rating += outcome.rating_delta;
        if outcome.won {
            persona.battles_won += 1;
        } else {
            persona.battles_lost += 1;
        }
        match outcome.wound {
            WoundUpdate::Keep => {}
            WoundUpdate::Clear => {
                persona.wounded = false;
                persona.wounded_until = None;
            }
            WoundUpdate::Until(until) => {
                persona.wounded = true;
                persona.wounded_until = Some(until);
            }
        }
        Ok(())
    }
}

/// In-process store. One write lock per commit keeps commits atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file yields an empty store.
    pub async fn load_from_path(path: impl AsRef<Path>) -> ArenaResult<Self> {
        let path = path.as_ref();
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no snapshot found, starting fresh");
                return Ok(Self::new());
            }
            Err(e) => return Err(ArenaError::Storage(format!("read {}: {}", path.display(), e))),
        };
        let data: StoreData = serde_json::from_str(&json)?;
        info!(
            path = %path.display(),
            personas = data.personas.len(),
            battles = data.battles.len(),
            listings = data.listings.len(),
            transactions = data.transactions.len(),
            "snapshot loaded"
        );
        Ok(Self { data: RwLock::new(data) })
    }

    pub async fn save_to_path(&self, path: impl AsRef<Path>) -> ArenaResult<()> {
        let path = path.as_ref();
        let json = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArenaError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ArenaError::Storage(format!("write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert_persona(&self, persona: Persona) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        if data.personas.contains_key(&persona.id) {
            return Err(ArenaError::Storage(format!("duplicate persona id {}", persona.id)));
        }
        data.personas.insert(persona.id.clone(), persona);
        Ok(())
    }

    async fn get_persona(&self, id: &str) -> ArenaResult<Option<Persona>> {
        Ok(self.data.read().await.personas.get(id).cloned())
    }

    async fn list_personas(&self, filter: &PersonaFilter) -> ArenaResult<Vec<Persona>> {
        let data = self.data.read().await;
        let mut personas: Vec<Persona> = data
            .personas
            .values()
            .filter(|p| filter.tier.map_or(true, |t| p.tier == t))
            .filter(|p| filter.owner_id.as_deref().map_or(true, |o| p.owner_id == o))
            .cloned()
            .collect();
        personas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        personas.truncate(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE));
        Ok(personas)
    }

    async fn leaderboard(&self, limit: usize) -> ArenaResult<Vec<Persona>> {
        let data = self.data.read().await;
        let mut personas: Vec<Persona> = data.personas.values().cloned().collect();
        personas.sort_by(|a, b| {
            b.rating
                .cmp(&a.rating)
                .then(b.battles_won.cmp(&a.battles_won))
                .then(a.created_at.cmp(&b.created_at))
        });
        personas.truncate(limit);
        Ok(personas)
    }

    async fn insert_battle(&self, battle: Battle) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        if data.battles.contains_key(&battle.id) {
            return Err(ArenaError::Storage(format!("duplicate battle id {}", battle.id)));
        }
        data.battles.insert(battle.id.clone(), battle);
        Ok(())
    }

    async fn get_battle(&self, id: &str) -> ArenaResult<Option<Battle>> {
        Ok(self.data.read().await.battles.get(id).cloned())
    }

    async fn battles_for_persona(&self, persona_id: &str, limit: usize) -> ArenaResult<Vec<Battle>> {
        let data = self.data.read().await;
        let mut battles: Vec<Battle> = data.battles.values().filter(|b| b.involves(persona_id)).cloned().collect();
        battles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        battles.truncate(limit);
        Ok(battles)
    }

    async fn update_battle_if(&self, battle: &Battle, expected: BattleStatus) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        let stored = data
            .battles
            .get_mut(&battle.id)
            .ok_or_else(|| ArenaError::not_found("Battle", &battle.id))?;
        if stored.status != expected {
            return Err(ArenaError::invalid_state(format!(
                "battle {} is {}, expected {}",
                battle.id, stored.status, expected
            )));
        }
        *stored = battle.clone();
        Ok(())
    }

    async fn commit_judgment(&self, commit: JudgmentCommit) -> ArenaResult<()> {
        let mut data = self.data.write().await;

        // Validate everything before the first write.
        let stored = data
            .battles
            .get(&commit.battle.id)
            .ok_or_else(|| ArenaError::not_found("Battle", &commit.battle.id))?;
        if stored.status != BattleStatus::Arguing {
            return Err(ArenaError::invalid_state(format!(
                "battle {} is {}, expected ARGUING",
                commit.battle.id, stored.status
            )));
        }
        for outcome in [&commit.winner, &commit.loser] {
            if !data.personas.contains_key(&outcome.persona_id) {
                return Err(ArenaError::not_found("Persona", &outcome.persona_id));
            }
        }
        if let Some(tx) = &commit.deposit {
            data.check_deposit(tx)?;
        }

        data.apply_outcome(&commit.winner)?;
        data.apply_outcome(&commit.loser)?;
        if let Some(tx) = commit.deposit {
            data.apply_deposit(tx)?;
        }
        data.battles.insert(commit.battle.id.clone(), commit.battle);
        Ok(())
    }

    async fn insert_listing_exclusive(&self, listing: Listing) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        let already_active = data
            .listings
            .values()
            .any(|l| l.persona_id == listing.persona_id && l.status == ListingStatus::Active);
        if already_active {
            return Err(ArenaError::AlreadyListed { persona_id: listing.persona_id });
        }
        data.listings.insert(listing.id.clone(), listing);
        Ok(())
    }

    async fn get_listing(&self, id: &str) -> ArenaResult<Option<Listing>> {
        Ok(self.data.read().await.listings.get(id).cloned())
    }

    async fn list_listings(&self, status: Option<ListingStatus>) -> ArenaResult<Vec<Listing>> {
        let data = self.data.read().await;
        Ok(data
            .listings
            .values()
            .filter(|l| status.map_or(true, |s| l.status == s))
            .cloned()
            .collect())
    }

    async fn cancel_listing_if_active(&self, listing_id: &str, now: DateTime<Utc>) -> ArenaResult<Listing> {
        let mut data = self.data.write().await;
        let listing = data
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| ArenaError::not_found("Listing", listing_id))?;
        if listing.status.is_terminal() {
            return Err(ArenaError::invalid_state(format!(
                "listing {} is {}, expected ACTIVE",
                listing_id, listing.status
            )));
        }
        listing.status = ListingStatus::Cancelled;
        listing.updated_at = now;
        Ok(listing.clone())
    }

    async fn commit_sale(&self, commit: SaleCommit) -> ArenaResult<Listing> {
        let mut data = self.data.write().await;

        let listing = data
            .listings
            .get(&commit.listing_id)
            .ok_or_else(|| ArenaError::not_found("Listing", &commit.listing_id))?;
        if listing.status.is_terminal() {
            return Err(ArenaError::invalid_state(format!(
                "listing {} is {}, expected ACTIVE",
                commit.listing_id, listing.status
            )));
        }
        let persona_id = listing.persona_id.clone();
        if commit.deposit.persona_id != persona_id {
            return Err(ArenaError::invalid_input("sale deposit must credit the listed persona"));
        }
        data.check_deposit(&commit.deposit)?;

        let persona = data.persona_mut(&persona_id)?;
        persona.owner_id = commit.buyer_id.clone();
        persona.owner_wallet = commit.buyer_wallet;
        data.apply_deposit(commit.deposit)?;

        let listing = data
            .listings
            .get_mut(&commit.listing_id)
            .ok_or_else(|| ArenaError::not_found("Listing", &commit.listing_id))?;
        listing.status = ListingStatus::Sold;
        listing.buyer_id = Some(commit.buyer_id);
        listing.settlement = Some(commit.breakdown);
        listing.sold_at = Some(commit.sold_at);
        listing.updated_at = commit.sold_at;
        Ok(listing.clone())
    }

    async fn commit_withdrawal(&self, tx: WalletTransaction, expected_owner: &str) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        if tx.tx_type != TxType::Withdrawal || tx.amount <= Decimal::ZERO {
            return Err(ArenaError::invalid_input("withdrawal must be a positive WITHDRAWAL transaction"));
        }
        let persona = data
            .personas
            .get(&tx.persona_id)
            .ok_or_else(|| ArenaError::not_found("Persona", &tx.persona_id))?;
        if persona.owner_id != expected_owner {
            return Err(ArenaError::forbidden(format!(
                "{} no longer owns persona {}",
                expected_owner, tx.persona_id
            )));
        }
        let available = data.balance_of(&tx.persona_id);
        if tx.amount > available {
            return Err(ArenaError::InsufficientBalance { available, requested: tx.amount });
        }
        data.transactions.push(tx);
        Ok(())
    }

    async fn commit_deposit(&self, tx: WalletTransaction) -> ArenaResult<()> {
        let mut data = self.data.write().await;
        data.check_deposit(&tx)?;
        data.apply_deposit(tx)
    }

    async fn transactions_for(&self, persona_id: &str) -> ArenaResult<Vec<WalletTransaction>> {
        let data = self.data.read().await;
        Ok(data
            .transactions
            .iter()
            .filter(|tx| tx.persona_id == persona_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// ENTITY LOCKS
// ============================================================================

/// Keyed async mutexes serialising work on one battle, listing or wallet.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    const PRUNE_THRESHOLD: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            if locks.len() > Self::PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(key.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cost::CostBreakdown;
    use crate::models::{BattleMode, EarningType, Traits, BASELINE_RATING};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    pub(crate) fn persona_fixture(id: &str, owner: &str) -> Persona {
        Persona {
            id: id.to_string(),
            name: format!("Persona {}", id),
            description: "fixture".to_string(),
            personality: "steady".to_string(),
            skills: vec!["Debate".to_string()],
            avatar_url: String::new(),
            tier: Tier::Rare,
            traits: Traits { intelligence: 60, creativity: 60, persuasion: 60, empathy: 60, technical: 60 },
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
            prompt_text: "fixture prompt".to_string(),
            prompt_score: 50,
            generation_cost: CostBreakdown::default(),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn battle_fixture(id: &str, status: BattleStatus) -> Battle {
        Battle {
            id: id.to_string(),
            mode: BattleMode::Ranked,
            topic: "tabs vs spaces".to_string(),
            persona1_id: "p1".to_string(),
            persona2_id: "p2".to_string(),
            initiator_id: "alice".to_string(),
            status,
            persona1_argument: None,
            persona2_argument: None,
            winner_id: None,
            judge_result: None,
            judge_digest: None,
            entry_fee: dec!(0.5),
            winner_reward: Decimal::ZERO,
            rewards: None,
            ai_cost: Decimal::ZERO,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn listing_fixture(id: &str, persona_id: &str) -> Listing {
        let now = Utc::now();
        Listing {
            id: id.to_string(),
            persona_id: persona_id.to_string(),
            seller_id: "alice".to_string(),
            price: dec!(10),
            status: ListingStatus::Active,
            buyer_id: None,
            settlement: None,
            created_at: now,
            updated_at: now,
            sold_at: None,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_persona(persona_fixture("p1", "alice")).await.unwrap();
        store.insert_persona(persona_fixture("p2", "bob")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_commit_start_is_conditional() {
        let store = seeded().await;
        store.insert_battle(battle_fixture("b1", BattleStatus::Pending)).await.unwrap();

        let battle = store.commit_start("b1", "a1".into(), "a2".into(), dec!(0.01)).await.unwrap();
        assert_eq!(battle.status, BattleStatus::Arguing);

        let err = store.commit_start("b1", "x".into(), "y".into(), dec!(0.01)).await.unwrap_err();
        assert!(matches!(err, ArenaError::InvalidState(_)));
        let stored = store.get_battle_required("b1").await.unwrap();
        assert_eq!(stored.persona1_argument.as_deref(), Some("a1"));
        assert_eq!(stored.ai_cost, dec!(0.01));
    }

    #[tokio::test]
    async fn test_commit_judgment_all_or_nothing() {
        let store = seeded().await;
        store.insert_battle(battle_fixture("b1", BattleStatus::Arguing)).await.unwrap();

        let mut done = battle_fixture("b1", BattleStatus::Completed);
        done.winner_id = Some("p1".into());
        let commit = JudgmentCommit {
            battle: done,
            winner: PersonaOutcome { persona_id: "p1".into(), rating_delta: 25, won: true, wound: WoundUpdate::Keep },
            loser: PersonaOutcome { persona_id: "ghost".into(), rating_delta: -30, won: false, wound: WoundUpdate::Clear },
            deposit: None,
        };
        assert!(store.commit_judgment(commit).await.is_err());

        // nothing applied
        assert_eq!(store.get_persona_required("p1").await.unwrap().rating, BASELINE_RATING);
        assert_eq!(store.get_battle_required("b1").await.unwrap().status, BattleStatus::Arguing);
    }

    #[tokio::test]
    async fn test_commit_judgment_applies_deltas_and_deposit() {
        let store = seeded().await;
        store.insert_battle(battle_fixture("b1", BattleStatus::Arguing)).await.unwrap();
        let until = Utc::now() + chrono::Duration::days(30);
        let deposit = WalletTransaction::deposit("p1", "wallet-p1", dec!(0.7), EarningType::Battle, Some("b1".into()), "r".into());

        let commit = JudgmentCommit {
            battle: battle_fixture("b1", BattleStatus::Completed),
            winner: PersonaOutcome { persona_id: "p1".into(), rating_delta: 25, won: true, wound: WoundUpdate::Keep },
            loser: PersonaOutcome { persona_id: "p2".into(), rating_delta: -30, won: false, wound: WoundUpdate::Until(until) },
            deposit: Some(deposit),
        };
        store.commit_judgment(commit.clone()).await.unwrap();

        let p1 = store.get_persona_required("p1").await.unwrap();
        let p2 = store.get_persona_required("p2").await.unwrap();
        assert_eq!((p1.rating, p1.battles_won, p1.total_revenue), (1025, 1, dec!(0.7)));
        assert_eq!((p2.rating, p2.battles_lost, p2.wounded), (970, 1, true));
        assert_eq!(p2.wounded_until, Some(until));
        assert_eq!(store.transactions_for("p1").await.unwrap().len(), 1);

        // replay is refused
        assert!(matches!(store.commit_judgment(commit).await, Err(ArenaError::InvalidState(_))));
        assert_eq!(store.transactions_for("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_active_listing_per_persona() {
        let store = seeded().await;
        store.insert_listing_exclusive(listing_fixture("l1", "p1")).await.unwrap();
        let err = store.insert_listing_exclusive(listing_fixture("l2", "p1")).await.unwrap_err();
        assert!(matches!(err, ArenaError::AlreadyListed { .. }));

        store.cancel_listing_if_active("l1", Utc::now()).await.unwrap();
        store.insert_listing_exclusive(listing_fixture("l3", "p1")).await.unwrap();
        assert_eq!(store.list_listings(Some(ListingStatus::Active)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_withdrawal_rechecks_owner_and_balance() {
        let store = seeded().await;
        let deposit = WalletTransaction::deposit("p1", "wallet-p1", dec!(5), EarningType::Battle, None, "r1".into());
        store.commit_deposit(deposit).await.unwrap();

        let too_much = WalletTransaction::withdrawal("p1", "wallet-p1", dec!(6), "ext", "r2".into());
        let err = store.commit_withdrawal(too_much, "alice").await.unwrap_err();
        assert!(matches!(err, ArenaError::InsufficientBalance { .. }));

        let stale_owner = WalletTransaction::withdrawal("p1", "wallet-p1", dec!(2), "ext", "r3".into());
        let err = store.commit_withdrawal(stale_owner, "bob").await.unwrap_err();
        assert!(matches!(err, ArenaError::Forbidden(_)));

        let ok = WalletTransaction::withdrawal("p1", "wallet-p1", dec!(5), "ext", "r4".into());
        store.commit_withdrawal(ok, "alice").await.unwrap();
        assert_eq!(store.transactions_for("p1").await.unwrap().len(), 2);

        let drained = WalletTransaction::withdrawal("p1", "wallet-p1", dec!(0.1), "ext", "r5".into());
        assert!(store.commit_withdrawal(drained, "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_battles_for_persona_newest_first() {
        let store = seeded().await;
        store.insert_persona(persona_fixture("p3", "carol")).await.unwrap();
        let start = Utc::now();
        for (i, (id, a, b)) in [("b1", "p1", "p2"), ("b2", "p2", "p3"), ("b3", "p3", "p1")].into_iter().enumerate() {
            let mut battle = battle_fixture(id, BattleStatus::Pending);
            battle.persona1_id = a.into();
            battle.persona2_id = b.into();
            battle.created_at = start + chrono::Duration::seconds(i as i64);
            store.insert_battle(battle).await.unwrap();
        }

        let history = store.battles_for_persona("p1", 20).await.unwrap();
        assert_eq!(history.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec!["b3", "b1"]);
        assert_eq!(store.battles_for_persona("p2", 1).await.unwrap()[0].id, "b2");
        assert!(store.battles_for_persona("nobody", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_listing_is_terminal() {
        let store = seeded().await;
        store.insert_listing_exclusive(listing_fixture("l1", "p1")).await.unwrap();
        store.cancel_listing_if_active("l1", Utc::now()).await.unwrap();
        let err = store.cancel_listing_if_active("l1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ArenaError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_history() {
        let dir = std::env::temp_dir().join(format!("arena-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("state.json");

        let store = seeded().await;
        let tx = WalletTransaction::deposit("p1", "wallet-p1", dec!(1.5), EarningType::Tip, None, "r".into());
        store.commit_deposit(tx).await.unwrap();
        store.save_to_path(&path).await.unwrap();

        let restored = MemoryStore::load_from_path(&path).await.unwrap();
        assert_eq!(restored.get_persona_required("p1").await.unwrap().total_revenue, dec!(1.5));
        assert_eq!(restored.transactions_for("p1").await.unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_snapshot_starts_empty() {
        let path = std::env::temp_dir().join(format!("arena-missing-{}.json", uuid::Uuid::new_v4()));
        let store = MemoryStore::load_from_path(&path).await.unwrap();
        assert!(store.leaderboard(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_lock_serialises_same_key() {
        let locks = Arc::new(EntityLocks::new());
        let guard = locks.acquire("battle-1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("battle-1").await;
            })
        };
        // other keys are independent
        let _other = locks.acquire("battle-2").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }
}
