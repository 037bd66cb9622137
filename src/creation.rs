// ============================================================================
// Creation Engine
// ============================================================================
//
// Flow: evaluate prompt → draw tier → generate content → generate image →
//       derive mint and wallet → record actual cost → persist
//
// Any AI failure aborts before the persist step, so a failed creation leaves
// nothing behind.
//
// ============================================================================

use chrono::Utc;
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ai::{AiProvider, PromptScore};
use crate::config::EconomyConfig;
use crate::cost::{CostBreakdown, CostEstimator};
use crate::error::{ArenaError, ArenaResult};
use crate::gacha::{classify_score, roll_for_score, GachaRoll, ScoreTier, TierProbabilities};
use crate::models::{Persona, BASELINE_RATING};
use crate::pricing::round_usd;
use crate::store::{PersonaFilter, Repository};

pub const MIN_PROMPT_CHARS: usize = 10;

const WALLET_SEED: &[u8] = b"persona-wallet";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptEvaluation {
    pub score: PromptScore,
    pub score_tier: ScoreTier,
    pub probabilities: TierProbabilities,
    /// What a full creation from this prompt would cost
    pub estimated_cost: CostBreakdown,
    /// USD spent on the evaluation call itself
    pub ai_cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedPersona {
    pub persona: Persona,
    pub evaluation: PromptScore,
    pub gacha: GachaRoll,
}

/// Wallet address derived from the mint, like a program-derived address.
pub fn derive_wallet_id(mint_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(WALLET_SEED);
    hasher.update(mint_address.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_mint_address() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn check_prompt(prompt: &str) -> ArenaResult<&str> {
    let prompt = prompt.trim();
    if prompt.chars().count() < MIN_PROMPT_CHARS {
        return Err(ArenaError::invalid_input(format!(
            "prompt must be at least {} characters",
            MIN_PROMPT_CHARS
        )));
    }
    Ok(prompt)
}

pub struct CreationEngine {
    repo: Arc<dyn Repository>,
    ai: Arc<dyn AiProvider>,
    costs: Arc<CostEstimator>,
    economy: Arc<EconomyConfig>,
}

impl CreationEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        ai: Arc<dyn AiProvider>,
        costs: Arc<CostEstimator>,
        economy: Arc<EconomyConfig>,
    ) -> Self {
        Self { repo, ai, costs, economy }
    }

    pub async fn evaluate_prompt(&self, prompt: &str) -> ArenaResult<PromptEvaluation> {
        let prompt = check_prompt(prompt)?;
        let evaluation = self.ai.evaluate(prompt).await?;
        let score = evaluation.score.normalized()?;
        let score_tier = classify_score(score.total);

        Ok(PromptEvaluation {
            score_tier,
            probabilities: self.economy.tiers.probabilities_for(score_tier),
            estimated_cost: self.costs.estimate_creation(prompt.chars().count()).await,
            ai_cost: round_usd(evaluation.usage.total_cost),
            score,
        })
    }

    pub async fn create_persona(
        &self,
        prompt: &str,
        user_id: &str,
        wallet_address: &str,
    ) -> ArenaResult<CreatedPersona> {
        let prompt = check_prompt(prompt)?;
        if user_id.trim().is_empty() {
            return Err(ArenaError::invalid_input("user id is required"));
        }

        let evaluation = self.ai.evaluate(prompt).await?;
        let score = evaluation.score.normalized()?;

        let gacha = roll_for_score(&self.economy.tiers, score.total, &mut rand::thread_rng());
        debug!(
            score = gacha.score,
            score_tier = %gacha.score_tier,
            roll = gacha.roll,
            tier = %gacha.tier,
            "tier drawn"
        );

        let generated = self.ai.generate_persona(prompt, gacha.tier).await?;
        generated.content.validate()?;
        let image = self.ai.generate_image(&generated.content.name).await?;

        let mint_address = random_mint_address();
        let wallet_id = derive_wallet_id(&mint_address);
        let generation_cost = self
            .costs
            .breakdown_from_usage(evaluation.usage.total_cost, generated.usage.total_cost, image.cost)
            .await;

        let content = generated.content;
        let persona = Persona {
            id: uuid::Uuid::new_v4().to_string(),
            name: content.name,
            description: content.description,
            personality: content.personality,
            skills: content.skills,
            avatar_url: image.image_url,
            tier: gacha.tier,
            traits: content.traits,
            rating: BASELINE_RATING,
            battles_won: 0,
            battles_lost: 0,
            wounded: false,
            wounded_until: None,
            owner_id: user_id.to_string(),
            owner_wallet: wallet_address.to_string(),
            creator_id: user_id.to_string(),
            total_revenue: Decimal::ZERO,
            wallet_id,
            mint_address,
            prompt_text: prompt.to_string(),
            prompt_score: score.total,
            generation_cost,
            created_at: Utc::now(),
        };
        self.repo.insert_persona(persona.clone()).await?;

        info!(
            persona_id = %persona.id,
            tier = %persona.tier,
            score = score.total,
            owner = %user_id,
            cost_usd = %persona.generation_cost.total_usd,
            "persona created"
        );
        Ok(CreatedPersona { persona, evaluation: score, gacha })
    }

    pub async fn get(&self, persona_id: &str) -> ArenaResult<Persona> {
        self.repo.get_persona_required(persona_id).await
    }

    pub async fn list(&self, filter: &PersonaFilter) -> ArenaResult<Vec<Persona>> {
        self.repo.list_personas(filter).await
    }
}
