// Data models for the persona arena

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ai::JudgeResult;
use crate::cost::CostBreakdown;

/// Rating every persona starts from.
pub const BASELINE_RATING: i64 = 1000;

// ============================================================================
// PERSONA
// ============================================================================

/// Rarity class of a persona.
///
/// The declaration order is the order the gacha walks when drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Common, Tier::Rare, Tier::Epic, Tier::Legendary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Common => "common",
            Tier::Rare => "rare",
            Tier::Epic => "epic",
            Tier::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five trait scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traits {
    pub intelligence: u8,
    pub creativity: u8,
    pub persuasion: u8,
    pub empathy: u8,
    pub technical: u8,
}

impl Traits {
    pub fn all_within(&self, max: u8) -> bool {
        [self.intelligence, self.creativity, self.persuasion, self.empathy, self.technical]
            .iter()
            .all(|v| *v <= max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub personality: String,
    pub skills: Vec<String>,
    pub avatar_url: String,
    pub tier: Tier,
    pub traits: Traits,
    pub rating: i64,
    pub battles_won: u32,
    pub battles_lost: u32,
    pub wounded: bool,
    pub wounded_until: Option<DateTime<Utc>>,
    pub owner_id: String,
    pub owner_wallet: String,
    pub creator_id: String,
    /// Sum of every deposit ever settled into the persona wallet.
    pub total_revenue: Decimal,
    pub wallet_id: String,
    pub mint_address: String,
    pub prompt_text: String,
    pub prompt_score: u32,
    pub generation_cost: CostBreakdown,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    /// A wound only blocks while its cooldown is running.
    pub fn is_wounded_at(&self, now: DateTime<Utc>) -> bool {
        self.wounded && self.wounded_until.map_or(true, |until| until > now)
    }

    /// Context handed to the AI backend when the persona argues or is judged.
    pub fn context(&self) -> PersonaContext {
        PersonaContext {
            name: self.name.clone(),
            description: self.description.clone(),
            personality: self.personality.clone(),
            tier: self.tier,
            traits: self.traits,
            skills: self.skills.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaContext {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub tier: Tier,
    pub traits: Traits,
    pub skills: Vec<String>,
}

// ============================================================================
// BATTLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BattleMode {
    Casual,
    Ranked,
    Deathmatch,
}

impl BattleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleMode::Casual => "CASUAL",
            BattleMode::Ranked => "RANKED",
            BattleMode::Deathmatch => "DEATHMATCH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "CASUAL" => Some(BattleMode::Casual),
            "RANKED" => Some(BattleMode::Ranked),
            "DEATHMATCH" => Some(BattleMode::Deathmatch),
            _ => None,
        }
    }
}

impl fmt::Display for BattleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Battle lifecycle.
///
/// Flow: Pending → Arguing → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BattleStatus {
    /// Created, no arguments yet
    Pending,
    /// Both arguments generated, awaiting judgment
    Arguing,
    /// Judged and settled
    Completed,
}

impl BattleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Completed)
    }
}

impl fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BattleStatus::Pending => "PENDING",
            BattleStatus::Arguing => "ARGUING",
            BattleStatus::Completed => "COMPLETED",
        };
        write!(f, "{}", s)
    }
}

/// Payout split of a battle pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub pool: Decimal,
    pub winner: Decimal,
    /// Accounting only; the ledger deposit is `winner`.
    pub creator_royalty: Decimal,
    pub platform: Decimal,
}

impl Rewards {
    pub fn zero() -> Self {
        Self {
            pool: Decimal::ZERO,
            winner: Decimal::ZERO,
            creator_royalty: Decimal::ZERO,
            platform: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: String,
    pub mode: BattleMode,
    pub topic: String,
    pub persona1_id: String,
    pub persona2_id: String,
    pub initiator_id: String,
    pub status: BattleStatus,
    pub persona1_argument: Option<String>,
    pub persona2_argument: Option<String>,
    pub winner_id: Option<String>,
    pub judge_result: Option<JudgeResult>,
    /// SHA-256 of the judge payload as persisted
    pub judge_digest: Option<String>,
    pub entry_fee: Decimal,
    pub winner_reward: Decimal,
    pub rewards: Option<Rewards>,
    /// USD spent on AI calls for this battle
    pub ai_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Battle {
    pub fn has_arguments(&self) -> bool {
        self.persona1_argument.is_some() && self.persona2_argument.is_some()
    }

    pub fn involves(&self, persona_id: &str) -> bool {
        self.persona1_id == persona_id || self.persona2_id == persona_id
    }
}

// ============================================================================
// MARKETPLACE
// ============================================================================

/// Listing lifecycle.
///
/// Flow: Active → Sold
///         ↓
///      Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
}

impl ListingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Sold | ListingStatus::Cancelled)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// How the price of a sale was divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleBreakdown {
    pub total: Decimal,
    pub seller: Decimal,
    pub creator: Decimal,
    pub platform: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub persona_id: String,
    pub seller_id: String,
    pub price: Decimal,
    pub status: ListingStatus,
    pub buyer_id: Option<String>,
    pub settlement: Option<SaleBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

// ============================================================================
// WALLET
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxType {
    Deposit,
    Withdrawal,
}

/// Where a deposit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EarningType {
    Battle,
    Marketplace,
    Chat,
    Tip,
}

impl fmt::Display for EarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EarningType::Battle => "BATTLE",
            EarningType::Marketplace => "MARKETPLACE",
            EarningType::Chat => "CHAT",
            EarningType::Tip => "TIP",
        };
        write!(f, "{}", s)
    }
}

/// One append-only entry of a persona wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub persona_id: String,
    pub wallet_id: String,
    pub tx_type: TxType,
    /// Set on deposits only
    pub earning_type: Option<EarningType>,
    pub amount: Decimal,
    pub related_battle_id: Option<String>,
    /// Set on withdrawals only
    pub destination: Option<String>,
    pub receipt_id: String,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn deposit(
        persona_id: &str,
        wallet_id: &str,
        amount: Decimal,
        earning_type: EarningType,
        related_battle_id: Option<String>,
        receipt_id: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            persona_id: persona_id.to_string(),
            wallet_id: wallet_id.to_string(),
            tx_type: TxType::Deposit,
            earning_type: Some(earning_type),
            amount,
            related_battle_id,
            destination: None,
            receipt_id,
            created_at: Utc::now(),
        }
    }

    pub fn withdrawal(
        persona_id: &str,
        wallet_id: &str,
        amount: Decimal,
        destination: &str,
        receipt_id: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            persona_id: persona_id.to_string(),
            wallet_id: wallet_id.to_string(),
            tx_type: TxType::Withdrawal,
            earning_type: None,
            amount,
            related_battle_id: None,
            destination: Some(destination.to_string()),
            receipt_id,
            created_at: Utc::now(),
        }
    }
}
