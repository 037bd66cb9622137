//! Battle lifecycle: Pending → Arguing → Completed.
//!
//! `engine` drives the state machine against the AI capability, the ledger and
//! the repository. `rewards` and `rating` are the pure settlement rules it
//! applies on judgment.

pub mod engine;
pub mod rating;
pub mod rewards;

pub use engine::{BattleEngine, CreateBattle, JudgeOutcome, StartOutcome};
pub use rating::{rating_update, RatingRules, RatingUpdate};
pub use rewards::{calculate_rewards, EntryFees, RewardRules};
