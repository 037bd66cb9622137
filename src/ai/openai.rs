// OpenAI chat-completions backend.
//
// Grok, DeepSeek and OpenRouter speak the same protocol; only the base URL and
// model names differ.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{
    extract_json, placeholder_avatar, prompts, AiProvider, BattleArgument, Evaluation,
    GeneratedArgument, GeneratedImage, GeneratedPersona, JudgeResult, Judgment, PersonaContent,
    PromptScore, TokenUsage,
};
use crate::error::{ArenaError, ArenaResult};
use crate::models::{PersonaContext, Tier};
use crate::pricing::{ProviderKind, ProviderPricing, TokenRate};

/// AI calls are slow; give them more room than settlement calls.
pub const AI_TIMEOUT_SECS: u64 = 60;

struct ModelSet {
    base_url: &'static str,
    evaluation: &'static str,
    text: &'static str,
    image: Option<&'static str>,
}

fn models_for(kind: ProviderKind) -> ModelSet {
    match kind {
        ProviderKind::Grok => ModelSet {
            base_url: "https://api.x.ai/v1",
            evaluation: "grok-beta",
            text: "grok-beta",
            image: None,
        },
        ProviderKind::DeepSeek => ModelSet {
            base_url: "https://api.deepseek.com/v1",
            evaluation: "deepseek-chat",
            text: "deepseek-chat",
            image: None,
        },
        ProviderKind::OpenRouter => ModelSet {
            base_url: "https://openrouter.ai/api/v1",
            evaluation: "openai/gpt-3.5-turbo",
            text: "openai/gpt-4-turbo",
            image: None,
        },
        _ => ModelSet {
            base_url: "https://api.openai.com/v1",
            evaluation: "gpt-3.5-turbo",
            text: "gpt-4-turbo",
            image: Some("dall-e-3"),
        },
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: String,
}

pub struct OpenAiProvider {
    kind: ProviderKind,
    api_key: String,
    base_url: String,
    models: ModelSet,
    pricing: ProviderPricing,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(kind: ProviderKind, api_key: String, base_url: Option<String>, pricing: ProviderPricing) -> Self {
        let models = models_for(kind);
        let base_url = base_url
            .unwrap_or_else(|| models.base_url.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(AI_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { kind, api_key, base_url, models, pricing, client }
    }

    async fn chat(&self, prompt: String, model: &str, rate: &TokenRate, max_tokens: u32) -> ArenaResult<(String, TokenUsage)> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArenaError::AiUnavailable(format!("{}: {}", self.kind, e)))?;

        if !response.status().is_success() {
            return Err(ArenaError::AiUnavailable(format!(
                "{} returned status {}",
                self.kind,
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::AiInvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ArenaError::AiInvalidResponse("completion has no content".into()))?;
        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));
        debug!(provider = %self.kind, model, input_tokens, output_tokens, "chat completion");

        let usage = TokenUsage {
            input_tokens,
            output_tokens,
            total_cost: rate.cost(input_tokens, output_tokens),
        };
        Ok((content, usage))
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation> {
        let (content, usage) = self
            .chat(prompts::evaluation(prompt), self.models.evaluation, &self.pricing.evaluation, 500)
            .await?;
        let score = extract_json::<PromptScore>(&content)?.normalized()?;
        Ok(Evaluation { score, usage })
    }

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona> {
        let (content, usage) = self
            .chat(prompts::persona(prompt, tier), self.models.text, &self.pricing.text, 3000)
            .await?;
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
            .chat(
                prompts::argument(persona, topic, opponent_argument),
                self.models.text,
                &self.pricing.text,
                1500,
            )
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
            .chat(
                prompts::judge(topic, persona1, argument1, persona2, argument2),
                self.models.text,
                &self.pricing.text,
                2000,
            )
            .await?;
        let result = extract_json::<JudgeResult>(&content)?.normalized()?;
        Ok(Judgment { result, usage })
    }

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
        let Some(model) = self.models.image else {
            return Ok(GeneratedImage { image_url: placeholder_avatar(seed), cost: Default::default() });
        };

        let url = format!("{}/images/generations", self.base_url);
        let body = json!({
            "model": model,
            "prompt": prompts::portrait(seed),
            "size": "1024x1024",
            "quality": "standard",
            "n": 1,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ArenaError::AiUnavailable(format!("{} image: {}", self.kind, e)))?;

        if !response.status().is_success() {
            return Err(ArenaError::AiUnavailable(format!(
                "{} image returned status {}",
                self.kind,
                response.status()
            )));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ArenaError::AiInvalidResponse(e.to_string()))?;
        let image_url = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| ArenaError::AiInvalidResponse("image response has no data".into()))?;
        Ok(GeneratedImage { image_url, cost: self.pricing.image })
    }
}
