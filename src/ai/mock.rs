// Mock AI backend: no network, plausible output, real accounting.

use async_trait::async_trait;
use rand::Rng;

use super::{
    placeholder_avatar, AiProvider, BattleArgument, DebateScores, Evaluation, GeneratedArgument,
    GeneratedImage, GeneratedPersona, JudgeHighlights, JudgeResult, JudgeScoreCard, JudgeWinner,
    Judgment, PersonaContent, PromptScore, TokenUsage,
};
use crate::error::ArenaResult;
use crate::models::{PersonaContext, Tier, Traits};
use crate::pricing::{ProviderKind, ProviderPricing, TokenRate};

pub struct MockProvider {
    pricing: ProviderPricing,
}

impl MockProvider {
    pub fn new(pricing: ProviderPricing) -> Self {
        Self { pricing }
    }

    fn usage(rate: &TokenRate, input_tokens: u64, output_tokens: u64) -> TokenUsage {
        TokenUsage {
            input_tokens,
            output_tokens,
            total_cost: rate.cost(input_tokens, output_tokens),
        }
    }
}

fn mock_traits<R: Rng>(rng: &mut R) -> Traits {
    Traits {
        intelligence: rng.gen_range(50..100),
        creativity: rng.gen_range(50..100),
        persuasion: rng.gen_range(50..100),
        empathy: rng.gen_range(50..100),
        technical: rng.gen_range(50..100),
    }
}

/// Split an overall mark into sub-scores that respect the caps.
fn split_debate_score(mark: u32) -> DebateScores {
    DebateScores {
        logical_coherence: mark * 30 / 100,
        creativity: mark * 25 / 100,
        persuasiveness: mark * 25 / 100,
        topic_relevance: mark * 20 / 100,
        total: 0,
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl AiProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn evaluate(&self, prompt: &str) -> ArenaResult<Evaluation> {
        let jitter: u32 = rand::thread_rng().gen_range(0..20);
        let base = (prompt.chars().count() as u32 / 5 + jitter).min(100);
        let criterion = (base / 4).min(PromptScore::CRITERION_MAX);
        let score = PromptScore {
            specificity: criterion,
            creativity: criterion,
            coherence: criterion,
            complexity: criterion,
            total: 0,
            reasoning: "Mock evaluation: prompt has a clear structure.".to_string(),
        }
        .normalized()?;
        Ok(Evaluation { score, usage: Self::usage(&self.pricing.evaluation, 50, 100) })
    }

    async fn generate_persona(&self, prompt: &str, tier: Tier) -> ArenaResult<GeneratedPersona> {
        let (traits, serial) = {
            let mut rng = rand::thread_rng();
            (mock_traits(&mut rng), rng.gen_range(0..1000u32))
        };
        let title = {
            let mut chars = tier.as_str().chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        };
        let content = PersonaContent {
            name: format!("{} Persona {}", title, serial),
            description: format!("A {} tier persona shaped by: {}", tier, excerpt(prompt, 100)),
            traits,
            skills: vec![
                "Analysis".to_string(),
                "Problem Solving".to_string(),
                "Communication".to_string(),
                "Strategic Thinking".to_string(),
            ],
            personality: format!("Thoughtful and analytical, with {} level polish.", tier),
        };
        Ok(GeneratedPersona { content, usage: Self::usage(&self.pricing.text, 200, 800) })
    }

    async fn generate_argument(
        &self,
        persona: &PersonaContext,
        topic: &str,
        opponent_argument: Option<&str>,
    ) -> ArenaResult<GeneratedArgument> {
        let rebuttal = if opponent_argument.is_some() {
            "My opponent raises fair points, yet "
        } else {
            ""
        };
        let argument = BattleArgument {
            argument: format!(
                "As {}, I hold that {} deserves a careful answer. {}the deciding factors are practical and they favour my side.",
                persona.name, topic, rebuttal
            ),
            key_points: vec![
                "Core principle".to_string(),
                "Historical context".to_string(),
                "Practical impact".to_string(),
            ],
            estimated_strength: rand::thread_rng().gen_range(70..90),
        };
        Ok(GeneratedArgument { argument, usage: Self::usage(&self.pricing.text, 300, 500) })
    }

    async fn judge(
        &self,
        _topic: &str,
        persona1: &PersonaContext,
        argument1: &str,
        persona2: &PersonaContext,
        argument2: &str,
    ) -> ArenaResult<Judgment> {
        let (mark1, mark2) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(60..100u32), rng.gen_range(60..100u32))
        };
        let scores = JudgeScoreCard {
            persona1: split_debate_score(mark1),
            persona2: split_debate_score(mark2),
        };
        let (winner, winner_name) = if mark1 > mark2 {
            (JudgeWinner::Persona1, &persona1.name)
        } else {
            (JudgeWinner::Persona2, &persona2.name)
        };
        let result = JudgeResult {
            winner,
            scores,
            reasoning: format!("{} made the more structured and persuasive case.", winner_name),
            highlights: JudgeHighlights {
                persona1_best: excerpt(argument1, 100),
                persona2_best: excerpt(argument2, 100),
            },
        }
        .normalized()?;
        Ok(Judgment { result, usage: Self::usage(&self.pricing.text, 1000, 800) })
    }

    async fn generate_image(&self, seed: &str) -> ArenaResult<GeneratedImage> {
        Ok(GeneratedImage { image_url: placeholder_avatar(seed), cost: self.pricing.image })
    }
}
