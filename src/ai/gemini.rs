// Gemini generateContent backend. No image model: avatars use the placeholder.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::openai::AI_TIMEOUT_SECS;
use super::{
    extract_json, placeholder_avatar, prompts, AiProvider, BattleArgument, Evaluation,
    GeneratedArgument, GeneratedImage, GeneratedPersona, JudgeResult, Judgment, PersonaContent,
    PromptScore, TokenUsage,
};
use crate::error::{ArenaError, ArenaResult};
use crate::models::{PersonaContext, Tier};
use crate::pricing::{ProviderKind, ProviderPricing, TokenRate};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-pro";

// Assumed when the response omits usage metadata.
const FALLBACK_INPUT_TOKENS: u64 = 200;
const FALLBACK_OUTPUT_TOKENS: u64 = 500;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    pricing: ProviderPricing,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, pricing: ProviderPricing) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(AI_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { api_key, base_url, pricing, client }
    }

    async fn generate(&self, prompt: String, rate: &TokenRate, max_tokens: u32) -> ArenaResult<(String, TokenUsage)> {
        let url = format!("{}/models/{}:generateContent", self.base_url, MODEL);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "maxOutputTokens": max_tokens, "temperature": 0.7 },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ArenaError::AiUnavailable(format!("gemini: {}", e)))?;

        if !response.status().is_success() {
            return Err(ArenaError::AiUnavailable(format!("gemini returned status {}", response.status())));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::AiInvalidResponse(e.to_string()))?;
        parse_generation(parsed, rate)
    }
}

fn parse_generation(parsed: GenerateResponse, rate: &TokenRate) -> ArenaResult<(String, TokenUsage)> {
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ArenaError::AiInvalidResponse("gemini returned no candidate text".into()))?;

    let (input_tokens, output_tokens) = match parsed.usage_metadata {
        Some(meta) => (
            meta.prompt_token_count.unwrap_or(FALLBACK_INPUT_TOKENS),
            meta.candidates_token_count.unwrap_or(FALLBACK_OUTPUT_TOKENS),
        ),
        None => (FALLBACK_INPUT_TOKENS, FALLBACK_OUTPUT_TOKENS),
    };
    debug!(input_tokens, output_tokens, "gemini generation");

    let usage = TokenUsage {
        input_tokens,
        output_tokens,
        total_cost: rate.cost(input_tokens, output_tokens),
    };
    Ok((text, usage))
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation> {
        let (content, usage) = self.generate(prompts::evaluation(prompt), &self.pricing.evaluation, 500).await?;
        let score = extract_json::<PromptScore>(&content)?.normalized()?;
        Ok(Evaluation { score, usage })
    }

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona> {
        let (content, usage) = self.generate(prompts::persona(prompt, tier), &self.pricing.text, 3000).await?;
        let content: PersonaContent = extract_json(&content)?;
        content.validate()?;
        Ok(GeneratedPersona { content, usage })
    }

    async fn generate_argument(
        &self,
        persona: &PersonaContext,
        topic: &str,
        opponent_argument: Option<&str>,
    ) -> ArenaResult<GeneratedArgument> {
        let (content, usage) = self
            .generate(prompts::argument(persona, topic, opponent_argument), &self.pricing.text, 1500)
            .await?;
        let argument: BattleArgument = extract_json(&content)?;
        Ok(GeneratedArgument { argument, usage })
    }

    async fn judge(
        &self,
        topic: &str,
        persona1: &PersonaContext,
        argument1: &str,
        persona2: &PersonaContext,
        argument2: &str,
    ) -> ArenaResult<Judgment> {
        let (content, usage) = self
            .generate(
                prompts::judge(topic, persona1, argument1, persona2, argument2),
                &self.pricing.text,
                2000,
            )
            .await?;
        let result = extract_json::<JudgeResult>(&content)?.normalized()?;
        Ok(Judgment { result, usage })
    }

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
        Ok(GeneratedImage { image_url: placeholder_avatar(seed), cost: Decimal::ZERO })
    }
}
