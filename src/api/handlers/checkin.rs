//! Daily check-in: map a body signal to a BASE category and hand back one
//! action, one movement and one verse for the day.
//!
//! Content comes from the text generator when one is configured, otherwise
//! (or when generation fails) from stored content, and finally from built-in
//! defaults. A generated recommendation is stored on the check-in row so the
//! same content can be shown again later that day.

use axum::{Json, extract::Extension, http::HeaderMap};
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use super::auth::AuthState;
use super::error::{ApiError, ErrorBody};
use crate::providers::{Providers, Recommendation, RecommendationPrompt};
use crate::store::{
    BaselineAction, CheckIn, DynStore, Verse,
    models::{now_timestamp, prefixed_id},
};

pub const BASE_CATEGORIES: [&str; 4] = ["B", "A", "S", "E"];

const DEFAULT_ID: &str = "default";
const GENERATED_ID: &str = "generated";
const DEFAULT_ACTION_TEXT: &str = "Take three deep breaths before your next meal";
const DEFAULT_MOVEMENT_TEXT: &str = "Take a 10-minute walk after eating";
const DEFAULT_VERSE_TEXT: &str = "Do you not know that your bodies are temples of the Holy Spirit?";
const DEFAULT_VERSE_REF: &str = "1 Corinthians 6:19";

/// BASE category for a body signal. `normal` draws one at random; anything
/// unrecognised lands on `B`.
#[must_use]
pub fn base_category(signal: &str) -> &'static str {
    match signal {
        "cravings" | "low_energy" => "B",
        "stressed" => "A",
        "digestion" => "E",
        "normal" => BASE_CATEGORIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("B"),
        _ => "B",
    }
}

#[must_use]
pub fn base_name(category: &str) -> &'static str {
    match category {
        "A" => "Activate Awareness",
        "S" => "Support Strength",
        "E" => "Engage Your Gut",
        _ => "Become Balanced",
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    pub signal: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ActionView {
    pub text: String,
    pub why_it_helps: String,
    pub examples: String,
    pub base_name: String,
    pub base_letter: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct MovementView {
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct VerseView {
    pub text: String,
    pub reference: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CheckInResponse {
    pub check_in_id: String,
    pub user_id: String,
    pub date: String,
    pub signal: String,
    pub base_category: String,
    pub action: ActionView,
    pub movement: MovementView,
    pub verse: VerseView,
}

/// `{"has_checkin": false}` or the day's check-in.
#[derive(Serialize, Deserialize, ToSchema, Debug, Default)]
pub struct TodayResponse {
    pub has_checkin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse: Option<VerseView>,
}

/// Resolved content for one check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Content {
    action_id: String,
    verse_id: String,
    generated: Option<Recommendation>,
    action_text: String,
    why_it_helps: String,
    examples: String,
    movement_text: String,
    verse_text: String,
    verse_ref: String,
}

impl Content {
    fn with_action(mut self, action: Option<BaselineAction>) -> Self {
        match action {
            Some(action) => {
                self.action_id = action.action_id;
                self.action_text = action.action_text;
                self.movement_text = action.movement_text;
                self.why_it_helps = action.why_it_helps.unwrap_or_default();
                self.examples = action.examples.unwrap_or_default();
            }
            None => {
                self.action_id = DEFAULT_ID.to_string();
                self.action_text = DEFAULT_ACTION_TEXT.to_string();
                self.movement_text = DEFAULT_MOVEMENT_TEXT.to_string();
                self.why_it_helps = String::new();
                self.examples = String::new();
            }
        }
        self
    }

    fn with_verse(mut self, verse: Option<Verse>) -> Self {
        match verse {
            Some(verse) => {
                self.verse_id = verse.verse_id;
                self.verse_text = verse.verse_text;
                self.verse_ref = verse.verse_ref;
            }
            None => {
                self.verse_id = DEFAULT_ID.to_string();
                self.verse_text = DEFAULT_VERSE_TEXT.to_string();
                self.verse_ref = DEFAULT_VERSE_REF.to_string();
            }
        }
        self
    }

    fn from_generated(recommendation: Recommendation) -> Self {
        let mut content = Self {
            action_id: GENERATED_ID.to_string(),
            verse_id: String::new(),
            generated: None,
            action_text: recommendation.action_text.clone(),
            why_it_helps: recommendation.why_it_helps.clone(),
            examples: recommendation.examples.clone(),
            movement_text: recommendation.movement_text.clone(),
            verse_text: String::new(),
            verse_ref: String::new(),
        };
        if has_verse(&recommendation) {
            content.verse_id = GENERATED_ID.to_string();
            content.verse_text.clone_from(&recommendation.verse_text);
            content.verse_ref.clone_from(&recommendation.verse_ref);
        }
        content.generated = Some(recommendation);
        content
    }

    fn empty() -> Self {
        Self {
            action_id: String::new(),
            verse_id: String::new(),
            generated: None,
            action_text: String::new(),
            why_it_helps: String::new(),
            examples: String::new(),
            movement_text: String::new(),
            verse_text: String::new(),
            verse_ref: String::new(),
        }
    }

    fn needs_verse(&self) -> bool {
        self.verse_id.is_empty()
    }

    fn views(&self, category: &str) -> (ActionView, MovementView, VerseView) {
        (
            ActionView {
                text: self.action_text.clone(),
                why_it_helps: self.why_it_helps.clone(),
                examples: self.examples.clone(),
                base_name: base_name(category).to_string(),
                base_letter: category.to_string(),
            },
            MovementView {
                text: self.movement_text.clone(),
            },
            VerseView {
                text: self.verse_text.clone(),
                reference: self.verse_ref.clone(),
            },
        )
    }
}

fn has_verse(recommendation: &Recommendation) -> bool {
    !recommendation.verse_text.trim().is_empty() && !recommendation.verse_ref.trim().is_empty()
}

fn pick<T: Clone>(items: &[T]) -> Option<T> {
    items.choose(&mut rand::thread_rng()).cloned()
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

async fn generate(providers: &Providers, prompt: &RecommendationPrompt) -> Option<Recommendation> {
    let generator = providers.text.as_ref()?;
    match generator.recommend(prompt).await {
        Ok(recommendation) if !recommendation.action_text.trim().is_empty() => Some(recommendation),
        Ok(_) => {
            warn!("generated recommendation has no action, using stored content");
            None
        }
        Err(err) => {
            warn!("AI recommendation error: {err:#}");
            None
        }
    }
}

async fn choose_content(
    store: &DynStore,
    providers: &Providers,
    prompt: &RecommendationPrompt,
) -> anyhow::Result<Content> {
    let category = prompt.base_category.as_str();
    let content = match generate(providers, prompt).await {
        Some(recommendation) => Content::from_generated(recommendation),
        None => {
            let actions = store.list_actions(Some(category)).await?;
            Content::empty().with_action(pick(&actions))
        }
    };
    if !content.needs_verse() {
        return Ok(content);
    }
    let verses = store.list_verses(&[category, "general"]).await?;
    Ok(content.with_verse(pick(&verses)))
}

/// Rebuild the content of a stored check-in; rows deleted since fall back to
/// defaults.
async fn stored_content(store: &DynStore, checkin: &CheckIn) -> anyhow::Result<Content> {
    let generated = checkin
        .generated
        .as_deref()
        .and_then(|json| match serde_json::from_str::<Recommendation>(json) {
            Ok(recommendation) => Some(recommendation),
            Err(err) => {
                warn!("stored recommendation unreadable: {err}");
                None
            }
        });

    let content = match generated {
        Some(recommendation) => Content::from_generated(recommendation),
        None => {
            let action = store.find_action(&checkin.action_id).await?;
            Content::empty().with_action(action)
        }
    };
    if !content.needs_verse() {
        return Ok(content);
    }
    let verse = store.find_verse(&checkin.verse_id).await?;
    Ok(content.with_verse(verse))
}

#[utoipa::path(
    post,
    path = "/api/checkin",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Today's BASEline", body = CheckInResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Active subscription required", body = ErrorBody),
    ),
    tag = "checkin"
)]
#[instrument(skip(headers, store, auth_state, providers, payload))]
pub async fn create(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    providers: Extension<Providers>,
    payload: Option<Json<CheckInRequest>>,
) -> Result<Json<CheckInResponse>, ApiError> {
    let user = auth_state.gate().require_subscription(&headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("signal required"));
    };

    let date = today();
    let category = base_category(&request.signal);
    let prompt = RecommendationPrompt {
        user_name: user.name.clone(),
        signal: request.signal.clone(),
        base_category: category.to_string(),
    };
    let content = choose_content(&store, &providers, &prompt).await?;

    let generated = content
        .generated
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(anyhow::Error::from)?;
    let checkin = CheckIn {
        check_in_id: prefixed_id("checkin"),
        user_id: user.user_id.clone(),
        date: date.clone(),
        signal: request.signal.clone(),
        base_category: category.to_string(),
        action_id: content.action_id.clone(),
        verse_id: content.verse_id.clone(),
        generated,
        created_at: now_timestamp(),
    };
    // One row per user per day; a second check-in replaces the first.
    store.upsert_checkin(&checkin).await?;
    info!(
        user_id = %user.user_id,
        base_category = category,
        action_id = %checkin.action_id,
        "check-in recorded"
    );

    let (action, movement, verse) = content.views(category);
    Ok(Json(CheckInResponse {
        check_in_id: checkin.check_in_id,
        user_id: checkin.user_id,
        date,
        signal: checkin.signal,
        base_category: checkin.base_category,
        action,
        movement,
        verse,
    }))
}

#[utoipa::path(
    get,
    path = "/api/checkin/today",
    responses(
        (status = 200, description = "Today's check-in, if any", body = TodayResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Active subscription required", body = ErrorBody),
    ),
    tag = "checkin"
)]
pub async fn today_checkin(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<TodayResponse>, ApiError> {
    let user = auth_state.gate().require_subscription(&headers).await?;

    let Some(checkin) = store.find_checkin(&user.user_id, &today()).await? else {
        debug!("no check-in today");
        return Ok(Json(TodayResponse::default()));
    };

    let content = stored_content(&store, &checkin).await?;
    let (action, movement, verse) = content.views(&checkin.base_category);
    Ok(Json(TodayResponse {
        has_checkin: true,
        check_in_id: Some(checkin.check_in_id),
        date: Some(checkin.date),
        signal: Some(checkin.signal),
        base_category: Some(checkin.base_category),
        action: Some(action),
        movement: Some(movement),
        verse: Some(verse),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        CheckoutRequest, CheckoutSession, CheckoutStatus, ExchangeError, ExternalIdentity,
        IdentityExchange, PaymentGateway, TextGenerator, WebhookError, WebhookEvent,
    };
    use crate::store::{ContentStore, MemoryStore};
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    struct NoIdentity;

    #[async_trait]
    impl IdentityExchange for NoIdentity {
        async fn exchange(&self, _session_id: &str) -> Result<ExternalIdentity, ExchangeError> {
            Err(ExchangeError::Rejected(reqwest::StatusCode::UNAUTHORIZED))
        }
    }

    struct NoPayments;

    #[async_trait]
    impl PaymentGateway for NoPayments {
        async fn create_checkout_session(&self, _: &CheckoutRequest) -> Result<CheckoutSession> {
            bail!("unused")
        }
        async fn checkout_status(&self, _: &str) -> Result<CheckoutStatus> {
            bail!("unused")
        }
        fn parse_webhook(&self, _: &[u8], _: Option<&str>) -> Result<WebhookEvent, WebhookError> {
            Err(WebhookError::NotConfigured)
        }
    }

    struct FixedText(Option<Recommendation>);

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn recommend(&self, _: &RecommendationPrompt) -> Result<Recommendation> {
            match &self.0 {
                Some(recommendation) => Ok(recommendation.clone()),
                None => bail!("provider timed out"),
            }
        }
    }

    fn providers(text: Option<FixedText>) -> Providers {
        Providers {
            identity: Arc::new(NoIdentity),
            payments: Arc::new(NoPayments),
            text: text.map(|text| Arc::new(text) as Arc<dyn TextGenerator>),
        }
    }

    fn prompt(category: &str) -> RecommendationPrompt {
        RecommendationPrompt {
            user_name: "Ruth".to_string(),
            signal: "stressed".to_string(),
            base_category: category.to_string(),
        }
    }

    fn action(id: &str, category: &str) -> BaselineAction {
        BaselineAction {
            action_id: id.to_string(),
            base_category: category.to_string(),
            action_text: format!("{id} text"),
            movement_text: format!("{id} movement"),
            why_it_helps: Some("because".to_string()),
            examples: None,
            created_at: now_timestamp(),
        }
    }

    fn verse(id: &str, category: &str) -> Verse {
        Verse {
            verse_id: id.to_string(),
            verse_text: format!("{id} text"),
            verse_ref: format!("{id} ref"),
            category: category.to_string(),
            created_at: now_timestamp(),
        }
    }

    #[test]
    fn signal_mapping() {
        assert_eq!(base_category("cravings"), "B");
        assert_eq!(base_category("low_energy"), "B");
        assert_eq!(base_category("stressed"), "A");
        assert_eq!(base_category("digestion"), "E");
        assert_eq!(base_category("unknown"), "B");
        assert_eq!(base_category(""), "B");
        for _ in 0..32 {
            assert!(BASE_CATEGORIES.contains(&base_category("normal")));
        }
    }

    #[test]
    fn category_names() {
        assert_eq!(base_name("B"), "Become Balanced");
        assert_eq!(base_name("A"), "Activate Awareness");
        assert_eq!(base_name("S"), "Support Strength");
        assert_eq!(base_name("E"), "Engage Your Gut");
        assert_eq!(base_name("?"), "Become Balanced");
    }

    #[tokio::test]
    async fn empty_store_without_generator_uses_defaults() -> Result<()> {
        let store: DynStore = Arc::new(MemoryStore::new());
        let content = choose_content(&store, &providers(None), &prompt("A")).await?;
        assert_eq!(content.action_id, DEFAULT_ID);
        assert_eq!(content.verse_id, DEFAULT_ID);
        assert_eq!(content.action_text, DEFAULT_ACTION_TEXT);
        assert_eq!(content.verse_ref, DEFAULT_VERSE_REF);
        assert!(content.generated.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn stored_content_matches_category() -> Result<()> {
        let memory = Arc::new(MemoryStore::new());
        memory.insert_action(&action("action_a", "A")).await?;
        memory.insert_action(&action("action_b", "B")).await?;
        memory.insert_verse(&verse("verse_b", "B")).await?;
        memory.insert_verse(&verse("verse_g", "general")).await?;
        let store: DynStore = memory;

        for _ in 0..16 {
            let content = choose_content(&store, &providers(None), &prompt("A")).await?;
            assert_eq!(content.action_id, "action_a");
            assert_eq!(content.why_it_helps, "because");
            assert_eq!(content.verse_id, "verse_g");
        }
        Ok(())
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_store() -> Result<()> {
        let memory = Arc::new(MemoryStore::new());
        memory.insert_action(&action("action_a", "A")).await?;
        let store: DynStore = memory;

        let content =
            choose_content(&store, &providers(Some(FixedText(None))), &prompt("A")).await?;
        assert_eq!(content.action_id, "action_a");
        assert!(content.generated.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn generated_content_wins_and_keeps_stored_verse_when_missing() -> Result<()> {
        let memory = Arc::new(MemoryStore::new());
        memory.insert_action(&action("action_a", "A")).await?;
        memory.insert_verse(&verse("verse_a", "A")).await?;
        let store: DynStore = memory;

        let recommendation = Recommendation {
            action_text: "Eat protein first".to_string(),
            movement_text: "Stretch".to_string(),
            ..Recommendation::default()
        };
        let content = choose_content(
            &store,
            &providers(Some(FixedText(Some(recommendation)))),
            &prompt("A"),
        )
        .await?;
        assert_eq!(content.action_id, GENERATED_ID);
        assert_eq!(content.action_text, "Eat protein first");
        assert_eq!(content.verse_id, "verse_a");
        assert!(content.generated.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn stored_checkin_falls_back_when_rows_are_gone() -> Result<()> {
        let store: DynStore = Arc::new(MemoryStore::new());
        let checkin = CheckIn {
            check_in_id: prefixed_id("checkin"),
            user_id: "user_1".to_string(),
            date: today(),
            signal: "stressed".to_string(),
            base_category: "A".to_string(),
            action_id: "action_deleted".to_string(),
            verse_id: "verse_deleted".to_string(),
            generated: None,
            created_at: now_timestamp(),
        };
        let content = stored_content(&store, &checkin).await?;
        assert_eq!(content.action_text, DEFAULT_ACTION_TEXT);
        assert_eq!(content.verse_text, DEFAULT_VERSE_TEXT);
        Ok(())
    }

    #[tokio::test]
    async fn stored_checkin_replays_generated_recommendation() -> Result<()> {
        let store: DynStore = Arc::new(MemoryStore::new());
        let recommendation = Recommendation {
            action_text: "Drink a glass of water".to_string(),
            why_it_helps: "Hydration".to_string(),
            examples: "Add lemon".to_string(),
            movement_text: "Walk".to_string(),
            verse_text: "The Lord is my shepherd".to_string(),
            verse_ref: "Psalm 23:1".to_string(),
        };
        let checkin = CheckIn {
            check_in_id: prefixed_id("checkin"),
            user_id: "user_1".to_string(),
            date: today(),
            signal: "digestion".to_string(),
            base_category: "E".to_string(),
            action_id: GENERATED_ID.to_string(),
            verse_id: GENERATED_ID.to_string(),
            generated: Some(serde_json::to_string(&recommendation)?),
            created_at: now_timestamp(),
        };
        let content = stored_content(&store, &checkin).await?;
        let (action, movement, verse) = content.views("E");
        assert_eq!(action.text, "Drink a glass of water");
        assert_eq!(action.examples, "Add lemon");
        assert_eq!(action.base_name, "Engage Your Gut");
        assert_eq!(movement.text, "Walk");
        assert_eq!(verse.reference, "Psalm 23:1");
        Ok(())
    }

    #[test]
    fn today_without_checkin_serializes_flag_only() -> Result<()> {
        let json = serde_json::to_value(TodayResponse::default())?;
        assert_eq!(json, serde_json::json!({"has_checkin": false}));
        Ok(())
    }
}
