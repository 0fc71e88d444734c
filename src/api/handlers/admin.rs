//! Admin content management for actions, trigger cards and verses.

use axum::{
    Json,
    extract::{Extension, Path},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::auth::{AuthState, types::MessageResponse};
use super::checkin::BASE_CATEGORIES;
use super::error::{ApiError, ErrorBody};
use crate::store::{
    BaselineAction, DynStore, TriggerCard, Verse,
    models::{now_timestamp, prefixed_id},
};

#[derive(Deserialize, ToSchema)]
pub struct ActionCreate {
    pub base_category: String,
    pub action_text: String,
    pub movement_text: String,
    #[serde(default)]
    pub why_it_helps: Option<String>,
    #[serde(default)]
    pub examples: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct TriggerCreate {
    pub trigger_type: String,
    pub title: String,
    pub immediate_action: String,
    pub explanation: String,
    pub body_truth: String,
    pub verse: String,
    pub verse_ref: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerseCreate {
    pub verse_text: String,
    pub verse_ref: String,
    pub category: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ActionCreated {
    pub action_id: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TriggerCreated {
    pub trigger_id: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct VerseCreated {
    pub verse_id: String,
    pub message: String,
}

fn valid_action_category(category: &str) -> bool {
    BASE_CATEGORIES.contains(&category)
}

fn valid_verse_category(category: &str) -> bool {
    category == "general" || valid_action_category(category)
}

#[utoipa::path(
    post,
    path = "/api/admin/actions",
    request_body = ActionCreate,
    responses(
        (status = 200, description = "Action created", body = ActionCreated),
        (status = 400, description = "Invalid category", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn create_action(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ActionCreate>>,
) -> Result<Json<ActionCreated>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    if !valid_action_category(&request.base_category) {
        return Err(ApiError::bad_request("Invalid base_category"));
    }

    let action = BaselineAction {
        action_id: prefixed_id("action"),
        base_category: request.base_category,
        action_text: request.action_text,
        movement_text: request.movement_text,
        why_it_helps: request.why_it_helps,
        examples: request.examples,
        created_at: now_timestamp(),
    };
    store.insert_action(&action).await?;
    info!(admin = %admin.user_id, action_id = %action.action_id, "action created");

    Ok(Json(ActionCreated {
        action_id: action.action_id,
        message: "Action created".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/actions",
    responses(
        (status = 200, description = "All actions", body = [BaselineAction]),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn list_actions(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<BaselineAction>>, ApiError> {
    auth_state.gate().require_admin(&headers).await?;
    Ok(Json(store.list_actions(None).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/actions/{action_id}",
    params(("action_id" = String, Path, description = "Action id")),
    responses(
        (status = 200, description = "Action deleted", body = MessageResponse),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "Action not found", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn delete_action(
    headers: HeaderMap,
    Path(action_id): Path<String>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    if !store.delete_action(&action_id).await? {
        return Err(ApiError::not_found("Action not found"));
    }
    info!(admin = %admin.user_id, action_id = %action_id, "action deleted");
    Ok(Json(MessageResponse::new("Action deleted")))
}

#[utoipa::path(
    post,
    path = "/api/admin/triggers",
    request_body = TriggerCreate,
    responses(
        (status = 200, description = "Trigger created", body = TriggerCreated),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn create_trigger(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TriggerCreate>>,
) -> Result<Json<TriggerCreated>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    if request.trigger_type.trim().is_empty() {
        return Err(ApiError::bad_request("trigger_type is required"));
    }

    let trigger = TriggerCard {
        trigger_id: prefixed_id("trigger"),
        trigger_type: request.trigger_type,
        title: request.title,
        immediate_action: request.immediate_action,
        explanation: request.explanation,
        body_truth: request.body_truth,
        verse: request.verse,
        verse_ref: request.verse_ref,
        created_at: now_timestamp(),
    };
    store.insert_trigger(&trigger).await?;
    info!(admin = %admin.user_id, trigger_id = %trigger.trigger_id, "trigger created");

    Ok(Json(TriggerCreated {
        trigger_id: trigger.trigger_id,
        message: "Trigger created".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/triggers",
    responses(
        (status = 200, description = "All trigger cards", body = [TriggerCard]),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn list_triggers(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<TriggerCard>>, ApiError> {
    auth_state.gate().require_admin(&headers).await?;
    Ok(Json(store.list_triggers(None).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/triggers/{trigger_id}",
    params(("trigger_id" = String, Path, description = "Trigger id")),
    responses(
        (status = 200, description = "Trigger deleted", body = MessageResponse),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "Trigger not found", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn delete_trigger(
    headers: HeaderMap,
    Path(trigger_id): Path<String>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    if !store.delete_trigger(&trigger_id).await? {
        return Err(ApiError::not_found("Trigger not found"));
    }
    info!(admin = %admin.user_id, trigger_id = %trigger_id, "trigger deleted");
    Ok(Json(MessageResponse::new("Trigger deleted")))
}

#[utoipa::path(
    post,
    path = "/api/admin/verses",
    request_body = VerseCreate,
    responses(
        (status = 200, description = "Verse created", body = VerseCreated),
        (status = 400, description = "Invalid category", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn create_verse(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerseCreate>>,
) -> Result<Json<VerseCreated>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };
    if !valid_verse_category(&request.category) {
        return Err(ApiError::bad_request("Invalid category"));
    }

    let verse = Verse {
        verse_id: prefixed_id("verse"),
        verse_text: request.verse_text,
        verse_ref: request.verse_ref,
        category: request.category,
        created_at: now_timestamp(),
    };
    store.insert_verse(&verse).await?;
    info!(admin = %admin.user_id, verse_id = %verse.verse_id, "verse created");

    Ok(Json(VerseCreated {
        verse_id: verse.verse_id,
        message: "Verse created".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/verses",
    responses(
        (status = 200, description = "All verses", body = [Verse]),
        (status = 403, description = "Admin access required", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn list_verses(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<Verse>>, ApiError> {
    auth_state.gate().require_admin(&headers).await?;
    Ok(Json(store.list_verses(&[]).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/verses/{verse_id}",
    params(("verse_id" = String, Path, description = "Verse id")),
    responses(
        (status = 200, description = "Verse deleted", body = MessageResponse),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 404, description = "Verse not found", body = ErrorBody),
    ),
    tag = "admin"
)]
pub async fn delete_verse(
    headers: HeaderMap,
    Path(verse_id): Path<String>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let admin = auth_state.gate().require_admin(&headers).await?;
    if !store.delete_verse(&verse_id).await? {
        return Err(ApiError::not_found("Verse not found"));
    }
    info!(admin = %admin.user_id, verse_id = %verse_id, "verse deleted");
    Ok(Json(MessageResponse::new("Verse deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_validation() {
        for category in ["B", "A", "S", "E"] {
            assert!(valid_action_category(category));
            assert!(valid_verse_category(category));
        }
        assert!(!valid_action_category("general"));
        assert!(valid_verse_category("general"));
        for category in ["b", "X", "", "General"] {
            assert!(!valid_action_category(category));
            assert!(!valid_verse_category(category));
        }
    }
}
