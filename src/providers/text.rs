//! Recommendation text from an OpenAI-compatible chat completions endpoint.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Instrument, info_span};

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = r#"You are a holistic nutritionist and wellness coach for Blessed Belly, a faith-informed metabolic health app for busy Christian women who want to lose stubborn belly fat without dieting or calorie counting.

Your role is to provide ONE simple, strategic, science-backed action that creates an immediate win. Your advice should:
1. Be specific, actionable, and doable in a busy woman's day
2. Include the scientific "why" in plain language (2-3 sentences)
3. Give concrete examples they can use RIGHT NOW
4. Build mindfulness and body awareness over time
5. Be warm, empowering, and grace-filled (not preachy)
6. Never mention calories, dieting, or restriction
7. Focus on adding good things, not removing "bad" things

Always respond in valid JSON format with these exact fields:
{
    "action_text": "The ONE specific action for today (1-2 sentences)",
    "why_it_helps": "Science-backed explanation in plain language (2-3 sentences)",
    "examples": "Specific, practical examples they can use immediately (2-3 sentences)",
    "movement_text": "One simple movement suggestion related to the action (1 sentence)",
    "verse_text": "A relevant scripture verse about the body, health, rest, or God's care",
    "verse_ref": "The scripture reference (e.g., 'Proverbs 3:5-6')"
}"#;

/// One generated recommendation. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Recommendation {
    pub action_text: String,
    pub why_it_helps: String,
    pub examples: String,
    pub movement_text: String,
    pub verse_text: String,
    pub verse_ref: String,
}

#[derive(Debug, Clone)]
pub struct RecommendationPrompt {
    pub user_name: String,
    pub signal: String,
    pub base_category: String,
}

impl RecommendationPrompt {
    #[must_use]
    pub fn system(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    #[must_use]
    pub fn user(&self) -> String {
        let state = match self.signal.as_str() {
            "stressed" => "feeling stressed or overwhelmed",
            "low_energy" => "experiencing low energy or fatigue",
            "cravings" => "having food cravings",
            "digestion" => "having digestive discomfort or bloating",
            "normal" => "feeling relatively normal today",
            _ => "checking in",
        };
        let focus = match self.base_category.as_str() {
            "B" => {
                "Become Balanced - focusing on balanced meals, blood sugar stability, and the 80/20 nutrition approach"
            }
            "A" => "Activate Awareness - focusing on mindful eating, stress awareness, and gratitude",
            "S" => "Support Strength - focusing on simple daily movement and gentle strength",
            "E" => "Engage Your Gut - focusing on gut health, fiber, and digestion support",
            _ => "general wellness",
        };
        format!(
            "Generate a personalized recommendation for {}.\n\n\
             Current state: She is {state}.\n\
             Focus area: {focus}\n\n\
             Provide ONE strategic action that will give her an immediate win and help her body feel better. \
             Make it specific to her current state, backed by science, and easy to implement in her busy day.",
            self.user_name
        )
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn recommend(&self, prompt: &RecommendationPrompt) -> Result<Recommendation>;
}

pub struct OpenAiTextGenerator {
    client: Client,
    api_url: String,
    api_key: SecretString,
    model: String,
}

impl std::fmt::Debug for OpenAiTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTextGenerator")
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiTextGenerator {
    #[must_use]
    pub fn new(client: Client, api_key: SecretString) -> Self {
        Self {
            client,
            api_url: DEFAULT_LLM_API_URL.to_string(),
            api_key,
            model: DEFAULT_LLM_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn recommend(&self, prompt: &RecommendationPrompt) -> Result<Recommendation> {
        let url = format!("{}/chat/completions", self.api_url);
        let span = info_span!(
            "text.recommend",
            http.method = "POST",
            model = %self.model,
            signal = %prompt.signal
        );
        async {
            let body = json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": prompt.system()},
                    {"role": "user", "content": prompt.user()},
                ],
            });
            let response = self
                .client
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await
                .context("chat completion request failed")?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("chat completion failed: {status}"));
            }
            let completion: ChatCompletion = response
                .json()
                .await
                .context("invalid chat completion response")?;
            let content = completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("chat completion has no content"))?;
            parse_recommendation(&content)
        }
        .instrument(span)
        .await
    }
}

/// Decode model output, tolerating a surrounding markdown code fence.
///
/// # Errors
/// Returns an error if the remaining text is not a JSON object.
pub fn parse_recommendation(content: &str) -> Result<Recommendation> {
    let mut text = content.trim();
    text = text.strip_prefix("```json").unwrap_or(text);
    text = text.strip_prefix("```").unwrap_or(text);
    text = text.strip_suffix("```").unwrap_or(text);
    serde_json::from_str(text.trim()).context("model output is not a recommendation object")
}
