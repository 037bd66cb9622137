// ============================================================================
// AI Capability - persona content, debate arguments, judging
// ============================================================================
//
// One capability trait, one backend variant per provider:
//   - mock:    local, no network, priced from the mock pricing row
//   - openai:  chat-completions API (also grok, deepseek, openrouter)
//   - gemini:  generateContent API
//
// Backends compute usage cost from the tokens they actually consumed and the
// pricing row of the configured provider. Payload validation happens here so
// every engine sees the same rules.
//
// ============================================================================

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod prompts;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

use crate::config::AiConfig;
use crate::error::{ArenaError, ArenaResult};
use crate::models::{PersonaContext, Tier, Traits};
use crate::pricing::{PricingTable, ProviderKind};

// ============================================================================
// PAYLOADS
// ============================================================================

/// Token counts and USD cost of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: Decimal,
}

/// Prompt quality, four criteria of 0-25 each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptScore {
    pub specificity: u32,
    pub creativity: u32,
    pub coherence: u32,
    pub complexity: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub reasoning: String,
}

impl PromptScore {
    pub const CRITERION_MAX: u32 = 25;

    /// Rejects out-of-range criteria and recomputes the total.
    pub fn normalized(mut self) -> ArenaResult<Self> {
        let criteria = [self.specificity, self.creativity, self.coherence, self.complexity];
        if criteria.iter().any(|c| *c > Self::CRITERION_MAX) {
            return Err(ArenaError::AiInvalidResponse(format!(
                "prompt score criterion above {}: {:?}",
                Self::CRITERION_MAX,
                criteria
            )));
        }
        self.total = criteria.iter().sum();
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: PromptScore,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaContent {
    pub name: String,
    pub description: String,
    pub traits: Traits,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub personality: String,
}

impl PersonaContent {
    pub fn validate(&self) -> ArenaResult<()> {
        if self.name.trim().is_empty() {
            return Err(ArenaError::AiInvalidResponse("persona has no name".into()));
        }
        if !self.traits.all_within(100) {
            return Err(ArenaError::AiInvalidResponse(format!(
                "persona trait outside 0-100: {:?}",
                self.traits
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPersona {
    pub content: PersonaContent,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleArgument {
    pub argument: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub estimated_strength: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArgument {
    pub argument: BattleArgument,
    pub usage: TokenUsage,
}

impl GeneratedArgument {
    pub fn validate(&self) -> ArenaResult<()> {
        if self.argument.argument.trim().is_empty() {
            return Err(ArenaError::AiInvalidResponse("empty argument".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeWinner {
    Persona1,
    Persona2,
}

/// Per-persona debate score. Caps: 30 / 25 / 25 / 20, total out of 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateScores {
    pub logical_coherence: u32,
    pub creativity: u32,
    pub persuasiveness: u32,
    pub topic_relevance: u32,
    #[serde(default)]
    pub total: u32,
}

impl DebateScores {
    pub fn normalized(mut self) -> ArenaResult<Self> {
        if self.logical_coherence > 30
            || self.creativity > 25
            || self.persuasiveness > 25
            || self.topic_relevance > 20
        {
            return Err(ArenaError::AiInvalidResponse(format!("debate sub-score above cap: {:?}", self)));
        }
        self.total = self.logical_coherence + self.creativity + self.persuasiveness + self.topic_relevance;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeScoreCard {
    pub persona1: DebateScores,
    pub persona2: DebateScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeHighlights {
    #[serde(default)]
    pub persona1_best: String,
    #[serde(default)]
    pub persona2_best: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeResult {
    pub winner: JudgeWinner,
    pub scores: JudgeScoreCard,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub highlights: JudgeHighlights,
}

impl JudgeResult {
    pub fn normalized(mut self) -> ArenaResult<Self> {
        self.scores.persona1 = self.scores.persona1.normalized()?;
        self.scores.persona2 = self.scores.persona2.normalized()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub result: JudgeResult,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_url: String,
    pub cost: Decimal,
}

// ============================================================================
// CAPABILITY
// ============================================================================

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Backend that answers, for cost attribution.
    fn kind(&self) -> ProviderKind;

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation>;

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona>;

    async fn generate_argument(
        &self,
        persona: &PersonaContext,
        topic: &str,
        opponent_argument: Option<&str>,
    ) -> ArenaResult<GeneratedArgument>;

    async fn judge(
        &self,
        topic: &str,
        persona1: &PersonaContext,
        argument1: &str,
        persona2: &PersonaContext,
        argument2: &str,
    ) -> ArenaResult<Judgment>;

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage>;
}

/// The configured backend.
pub enum AiBackend {
    Mock(MockProvider),
    OpenAi(OpenAiProvider),
    Gemini(GeminiProvider),
}

impl AiBackend {
    pub fn from_config(config: &AiConfig, pricing: &PricingTable) -> ArenaResult<Self> {
        let rates = *pricing.for_provider(config.provider);
        let backend = match config.provider {
            ProviderKind::Mock => AiBackend::Mock(MockProvider::new(rates)),
            ProviderKind::OpenAi | ProviderKind::Grok | ProviderKind::DeepSeek | ProviderKind::OpenRouter => {
                let api_key = required_key(config)?;
                AiBackend::OpenAi(OpenAiProvider::new(
                    config.provider,
                    api_key,
                    config.base_url.clone(),
                    rates,
                ))
            }
            ProviderKind::Gemini => {
                let api_key = required_key(config)?;
                AiBackend::Gemini(GeminiProvider::new(api_key, config.base_url.clone(), rates))
            }
            ProviderKind::Bedrock => {
                return Err(ArenaError::config(
                    "bedrock backend is not available in this build; choose another AI_PROVIDER",
                ))
            }
        };
        info!(provider = %config.provider, "AI backend ready");
        Ok(backend)
    }

    fn inner(&self) -> &dyn AiProvider {
        match self {
            AiBackend::Mock(p) => p,
            AiBackend::OpenAi(p) => p,
            AiBackend::Gemini(p) => p,
        }
    }
}

fn required_key(config: &AiConfig) -> ArenaResult<String> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ArenaError::config(format!(
                "{} API key required ({})",
                config.provider,
                config.provider.api_key_var().unwrap_or("API key")
            ))
        })
}

#[async_trait]
impl AiProvider for AiBackend {
    fn kind(&self) -> ProviderKind {
        self.inner().kind()
    }

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation> {
        self.inner().evaluate(prompt).await
    }

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona> {
        self.inner().generate_persona(prompt, tier).await
    }

    async fn generate_argument(
        &self,
        persona: &PersonaContext,
        topic: &str,
        opponent_argument: Option<&str>,
    ) -> ArenaResult<GeneratedArgument> {
        self.inner().generate_argument(persona, topic, opponent_argument).await
    }

    async fn judge(
        &self,
        topic: &str,
        persona1: &PersonaContext,
        argument1: &str,
        persona2: &PersonaContext,
        argument2: &str,
    ) -> ArenaResult<Judgment> {
        self.inner().judge(topic, persona1, argument1, persona2, argument2).await
    }

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
        self.inner().generate_image(seed).await
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Parse the first `{` .. last `}` span of model output.
pub fn extract_json<T: DeserializeOwned>(content: &str) -> ArenaResult<T> {
    static JSON_SPAN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = JSON_SPAN
        .get_or_init(|| Regex::new(r"(?s)\{.*\}"))
        .as_ref()
        .map_err(|e| ArenaError::AiInvalidResponse(e.to_string()))?;
    let span = re
        .find(content)
        .ok_or_else(|| ArenaError::AiInvalidResponse("no JSON object in model output".into()))?;
    serde_json::from_str(span.as_str()).map_err(|e| ArenaError::AiInvalidResponse(e.to_string()))
}

/// Avatar used when a backend has no image model.
pub fn placeholder_avatar(seed: &str) -> String {
    let encoded: String = seed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_output() {
        let content = "Sure! Here you go:\n```json\n{\"argument\": \"Tabs win.\", \"keyPoints\": [\"a\"]}\n```";
        let arg: BattleArgument = extract_json(content).unwrap();
        assert_eq!(arg.argument, "Tabs win.");
        assert_eq!(arg.key_points, vec!["a".to_string()]);
        assert_eq!(arg.estimated_strength, 0);
    }

    #[test]
    fn test_extract_json_missing_object() {
        let err = extract_json::<BattleArgument>("no json here").unwrap_err();
        assert!(matches!(err, ArenaError::AiInvalidResponse(_)));
    }

    #[test]
    fn test_prompt_score_total_recomputed() {
        let score = PromptScore {
            specificity: 20,
            creativity: 15,
            coherence: 25,
            complexity: 10,
            total: 3,
            reasoning: String::new(),
        };
        assert_eq!(score.normalized().unwrap().total, 70);
    }

    #[test]
    fn test_prompt_score_out_of_range() {
        let score = PromptScore {
            specificity: 26,
            creativity: 0,
            coherence: 0,
            complexity: 0,
            total: 26,
            reasoning: String::new(),
        };
        assert!(score.normalized().is_err());
    }

    #[test]
    fn test_judge_caps_enforced() {
        let json = r#"{
            "winner": "persona1",
            "scores": {
                "persona1": {"logicalCoherence": 28, "creativity": 20, "persuasiveness": 22, "topicRelevance": 15},
                "persona2": {"logicalCoherence": 31, "creativity": 10, "persuasiveness": 10, "topicRelevance": 9}
            }
        }"#;
        let result: JudgeResult = extract_json(json).unwrap();
        assert!(matches!(result.normalized(), Err(ArenaError::AiInvalidResponse(_))));
    }

    #[test]
    fn test_judge_totals_recomputed() {
        let json = r#"{
            "winner": "persona2",
            "scores": {
                "persona1": {"logicalCoherence": 18, "creativity": 15, "persuasiveness": 15, "topicRelevance": 12, "total": 99},
                "persona2": {"logicalCoherence": 25, "creativity": 20, "persuasiveness": 22, "topicRelevance": 18}
            },
            "reasoning": "Sharper rebuttal.",
            "highlights": {"persona1Best": "x", "persona2Best": "y"}
        }"#;
        let result: JudgeResult = extract_json::<JudgeResult>(json).unwrap().normalized().unwrap();
        assert_eq!(result.winner, JudgeWinner::Persona2);
        assert_eq!(result.scores.persona1.total, 60);
        assert_eq!(result.scores.persona2.total, 85);
    }

    #[test]
    fn test_bedrock_rejected_at_startup() {
        let config = AiConfig { provider: ProviderKind::Bedrock, api_key: None, base_url: None };
        let err = AiBackend::from_config(&config, &PricingTable::default()).err().unwrap();
        assert!(matches!(err, ArenaError::Configuration(_)));
    }

    #[test]
    fn test_keyed_backend_requires_key() {
        let config = AiConfig { provider: ProviderKind::OpenAi, api_key: Some("  ".into()), base_url: None };
        assert!(AiBackend::from_config(&config, &PricingTable::default()).is_err());
        let config = AiConfig { provider: ProviderKind::Mock, api_key: None, base_url: None };
        let backend = AiBackend::from_config(&config, &PricingTable::default()).unwrap();
        assert_eq!(backend.kind(), ProviderKind::Mock);
    }
}
