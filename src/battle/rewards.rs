//! Reward calculator: battle mode and entry fee to payout split.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::models::{BattleMode, Rewards};
use crate::pricing::round_native;

/// Entry fee per mode, native currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFees {
    pub casual: Decimal,
    pub ranked: Decimal,
    pub deathmatch: Decimal,
}

impl Default for EntryFees {
    fn default() -> Self {
        Self { casual: Decimal::ZERO, ranked: dec!(0.5), deathmatch: dec!(2) }
    }
}

impl EntryFees {
    pub fn for_mode(&self, mode: BattleMode) -> Decimal {
        match mode {
            BattleMode::Casual => self.casual,
            BattleMode::Ranked => self.ranked,
            BattleMode::Deathmatch => self.deathmatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRules {
    pub entry_fees: EntryFees,
    pub ranked_winner_share: Decimal,
    pub deathmatch_winner_share: Decimal,
    /// Share of the winner payout attributed to the creator
    pub creator_royalty_share: Decimal,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            entry_fees: EntryFees::default(),
            ranked_winner_share: dec!(0.7),
            deathmatch_winner_share: dec!(0.8),
            creator_royalty_share: dec!(0.2),
        }
    }
}

impl RewardRules {
    pub fn validate(&self) -> ArenaResult<()> {
        let fees = [self.entry_fees.casual, self.entry_fees.ranked, self.entry_fees.deathmatch];
        if fees.iter().any(|f| f.is_sign_negative()) {
            return Err(ArenaError::config("Entry fees must not be negative"));
        }
        let shares = [self.ranked_winner_share, self.deathmatch_winner_share, self.creator_royalty_share];
        if shares.iter().any(|s| *s < Decimal::ZERO || *s > Decimal::ONE) {
            return Err(ArenaError::config("Reward shares must be within [0, 1]"));
        }
        Ok(())
    }
}

/// `pool = 2 × entry_fee`; casual battles pay nothing. The platform cut is
/// the remainder so `winner + platform == pool` holds exactly.
pub fn calculate_rewards(mode: BattleMode, entry_fee: Decimal, rules: &RewardRules) -> Rewards {
    let share = match mode {
        BattleMode::Casual => return Rewards::zero(),
        BattleMode::Ranked => rules.ranked_winner_share,
        BattleMode::Deathmatch => rules.deathmatch_winner_share,
    };
    let pool = entry_fee * dec!(2);
    let winner = round_native(pool * share);
    Rewards {
        pool,
        winner,
        creator_royalty: round_native(winner * rules.creator_royalty_share),
        platform: pool - winner,
    }
}
