//! Tier resolver.
//!
//! A prompt's quality score picks a probability row; a weighted draw over
//! that row picks the persona's tier.
//!
//! Draw order is fixed: Common, Rare, Epic, Legendary. The roll is uniform in
//! `[0, 100)` and the first tier whose cumulative mass exceeds it wins. If
//! floating-point drift leaves the walk without a winner the result is Common.
//! Fairness audits depend on both rules, so neither may change silently.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArenaError, ArenaResult};
use crate::models::Tier;

/// Quality band of a prompt score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    Low,
    Medium,
    High,
    Exceptional,
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoreTier::Low => "low",
            ScoreTier::Medium => "medium",
            ScoreTier::High => "high",
            ScoreTier::Exceptional => "exceptional",
        };
        write!(f, "{}", s)
    }
}

/// `<41` low, `41-70` medium, `71-85` high, `>=86` exceptional.
pub fn classify_score(score: u32) -> ScoreTier {
    if score >= 86 {
        ScoreTier::Exceptional
    } else if score >= 71 {
        ScoreTier::High
    } else if score >= 41 {
        ScoreTier::Medium
    } else {
        ScoreTier::Low
    }
}

/// Integer percentages per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProbabilities {
    pub common: u32,
    pub rare: u32,
    pub epic: u32,
    pub legendary: u32,
}

impl TierProbabilities {
    pub const fn new(common: u32, rare: u32, epic: u32, legendary: u32) -> Self {
        Self { common, rare, epic, legendary }
    }

    pub fn weight(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Common => self.common,
            Tier::Rare => self.rare,
            Tier::Epic => self.epic,
            Tier::Legendary => self.legendary,
        }
    }

    pub fn total(&self) -> u32 {
        self.common + self.rare + self.epic + self.legendary
    }
}

/// One probability row per score band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    pub low: TierProbabilities,
    pub medium: TierProbabilities,
    pub high: TierProbabilities,
    pub exceptional: TierProbabilities,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            low: TierProbabilities::new(80, 15, 4, 1),
            medium: TierProbabilities::new(50, 35, 12, 3),
            high: TierProbabilities::new(25, 40, 28, 7),
            exceptional: TierProbabilities::new(5, 30, 45, 20),
        }
    }
}

impl TierTable {
    pub fn probabilities_for(&self, score_tier: ScoreTier) -> TierProbabilities {
        match score_tier {
            ScoreTier::Low => self.low,
            ScoreTier::Medium => self.medium,
            ScoreTier::High => self.high,
            ScoreTier::Exceptional => self.exceptional,
        }
    }

    pub fn validate(&self) -> ArenaResult<()> {
        let rows = [
            (ScoreTier::Low, self.low),
            (ScoreTier::Medium, self.medium),
            (ScoreTier::High, self.high),
            (ScoreTier::Exceptional, self.exceptional),
        ];
        for (band, row) in rows {
            if row.total() != 100 {
                return Err(ArenaError::config(format!(
                    "Tier probabilities for {} sum to {}, expected 100",
                    band,
                    row.total()
                )));
            }
        }
        Ok(())
    }
}

/// Weighted draw over a validated probability row.
pub fn draw<R: Rng + ?Sized>(probabilities: &TierProbabilities, rng: &mut R) -> Tier {
    let roll: f64 = rng.gen_range(0.0..100.0);
    draw_with_roll(probabilities, roll)
}

/// The deterministic half of [`draw`], given the roll.
pub fn draw_with_roll(probabilities: &TierProbabilities, roll: f64) -> Tier {
    let mut cumulative = 0.0;
    for tier in Tier::ALL {
        cumulative += f64::from(probabilities.weight(tier));
        if roll < cumulative {
            return tier;
        }
    }
    Tier::Common
}

/// Audit record of one tier draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GachaRoll {
    pub score: u32,
    pub score_tier: ScoreTier,
    pub probabilities: TierProbabilities,
    pub roll: f64,
    pub tier: Tier,
}

pub fn roll_for_score<R: Rng + ?Sized>(table: &TierTable, score: u32, rng: &mut R) -> GachaRoll {
    let score_tier = classify_score(score);
    let probabilities = table.probabilities_for(score_tier);
    let roll: f64 = rng.gen_range(0.0..100.0);
    let tier = draw_with_roll(&probabilities, roll);
    GachaRoll { score, score_tier, probabilities, roll, tier }
}
