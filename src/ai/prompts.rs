// Prompt templates shared by the HTTP backends.

use crate::models::{PersonaContext, Tier};

pub fn evaluation(prompt: &str) -> String {
    format!(
        "Rate this AI persona prompt. Score each criterion from 0 to 25: \
         specificity, creativity, coherence, complexity.\n\
         Reply with JSON only: {{\"specificity\": n, \"creativity\": n, \"coherence\": n, \
         \"complexity\": n, \"reasoning\": \"...\"}}\n\nPrompt:\n\"{}\"",
        prompt
    )
}

pub fn persona(prompt: &str, tier: Tier) -> String {
    format!(
        "Create a {} tier AI persona from this description:\n\"{}\"\n\
         Reply with JSON only: {{\"name\": \"...\", \"description\": \"...\", \
         \"traits\": {{\"intelligence\": 0-100, \"creativity\": 0-100, \"persuasion\": 0-100, \
         \"empathy\": 0-100, \"technical\": 0-100}}, \"skills\": [\"...\"], \"personality\": \"...\"}}",
        tier, prompt
    )
}

pub fn argument(persona: &PersonaContext, topic: &str, opponent_argument: Option<&str>) -> String {
    let rebuttal = opponent_argument
        .map(|a| format!("\nYour opponent argued:\n\"{}\"\nAddress it directly.", a))
        .unwrap_or_default();
    format!(
        "You are {}, {}. Personality: {}. Skills: {}.\n\
         Debate topic: \"{}\".{}\n\
         Reply with JSON only: {{\"argument\": \"...\", \"keyPoints\": [\"...\"], \"estimatedStrength\": 0-100}}",
        persona.name,
        persona.description,
        persona.personality,
        persona.skills.join(", "),
        topic,
        rebuttal
    )
}

pub fn judge(
    topic: &str,
    persona1: &PersonaContext,
    argument1: &str,
    persona2: &PersonaContext,
    argument2: &str,
) -> String {
    format!(
        "Judge this debate on \"{}\".\n\
         persona1 ({}):\n\"{}\"\n\
         persona2 ({}):\n\"{}\"\n\
         Score each side: logicalCoherence 0-30, creativity 0-25, persuasiveness 0-25, topicRelevance 0-20.\n\
         Reply with JSON only: {{\"winner\": \"persona1\"|\"persona2\", \
         \"scores\": {{\"persona1\": {{...}}, \"persona2\": {{...}}}}, \"reasoning\": \"...\", \
         \"highlights\": {{\"persona1Best\": \"...\", \"persona2Best\": \"...\"}}}}",
        topic, persona1.name, argument1, persona2.name, argument2
    )
}

pub fn portrait(seed: &str) -> String {
    format!("Portrait of {}, high quality digital art", seed)
}
