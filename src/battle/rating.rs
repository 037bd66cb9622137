//! Rating updater: battle mode and outcome to rating deltas and wounds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::models::BattleMode;
use crate::store::WoundUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRules {
    pub ranked_win: i64,
    pub unranked_win: i64,
    /// Ranked and deathmatch losses
    pub competitive_loss: i64,
    pub casual_loss: i64,
    pub wound_days: i64,
}

/// Upper bound on the wound cooldown, ten years.
pub const MAX_WOUND_DAYS: i64 = 3650;

impl Default for RatingRules {
    fn default() -> Self {
        Self { ranked_win: 25, unranked_win: 10, competitive_loss: 30, casual_loss: 20, wound_days: 30 }
    }
}

impl RatingRules {
    pub fn validate(&self) -> ArenaResult<()> {
        let magnitudes = [self.ranked_win, self.unranked_win, self.competitive_loss, self.casual_loss];
        if magnitudes.iter().any(|m| *m < 0) {
            return Err(ArenaError::config("Rating deltas are magnitudes and must not be negative"));
        }
        if self.wound_days <= 0 {
            return Err(ArenaError::config("Wound cooldown must be at least one day"));
        }
        if self.wound_days > MAX_WOUND_DAYS {
            return Err(ArenaError::config(format!(
                "Wound cooldown of {} days exceeds the {} day limit",
                self.wound_days, MAX_WOUND_DAYS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub winner_delta: i64,
    pub loser_delta: i64,
    pub loser_wounded: bool,
    pub loser_wounded_until: Option<DateTime<Utc>>,
}

impl RatingUpdate {
    /// Losers always get an explicit wound state; winners keep theirs.
    pub fn loser_wound(&self) -> WoundUpdate {
        match self.loser_wounded_until {
            Some(until) if self.loser_wounded => WoundUpdate::Until(until),
            _ => WoundUpdate::Clear,
        }
    }
}

fn wound_expiry(now: DateTime<Utc>, days: i64) -> ArenaResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|cooldown| now.checked_add_signed(cooldown))
        .ok_or_else(|| ArenaError::config(format!("Wound cooldown of {} days is out of range", days)))
}

pub fn rating_update(mode: BattleMode, now: DateTime<Utc>, rules: &RatingRules) -> ArenaResult<RatingUpdate> {
    let winner_delta = match mode {
        BattleMode::Ranked => rules.ranked_win,
        BattleMode::Casual | BattleMode::Deathmatch => rules.unranked_win,
    };
    let loser_delta = match mode {
        BattleMode::Casual => -rules.casual_loss,
        BattleMode::Ranked | BattleMode::Deathmatch => -rules.competitive_loss,
    };
    let wounded = mode == BattleMode::Ranked;
    let loser_wounded_until = if wounded { Some(wound_expiry(now, rules.wound_days)?) } else { None };
    Ok(RatingUpdate { winner_delta, loser_delta, loser_wounded: wounded, loser_wounded_until })
}
