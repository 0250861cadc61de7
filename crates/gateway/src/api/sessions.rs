//! Session lifecycle endpoints.
//!
//! - `POST   /create-session`
//! - `GET    /get-status/:id`
//! - `GET    /get-session/:id`
//! - `DELETE /delete-session/:id`
//! - `GET    /toggle-message-loader/:id`
//! - `GET    /toggle-media-loader/:id` (also `/toggle-medial-loader/:id`)
//! - `POST   /update-message-callback-url`

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use serde::Deserialize;
use serde_json::json;

use super::error::{ok, ApiError, ApiResult};
use crate::runtime::session::ToggleOutcome;
use crate::runtime::{DeleteOutcome, NewSession};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default, alias = "clientId")]
    pub id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub message_callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCallbackRequest {
    #[serde(default, alias = "clientId")]
    pub id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /create-session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let id = required(body.id, "id")?;
    let callback_url = required(body.callback_url, "callbackUrl")?;

    let handle = state
        .registry
        .create(NewSession {
            id: id.clone(),
            callback_url,
            message_callback_url: body.message_callback_url,
        })
        .await?;

    ok(
        format!("Session for ID {id} created successfully!"),
        json!({ "id": id, "status": handle.status() }),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /get-status/:id, GET /get-session/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let handle = state.registry.require(&id)?;
    ok("", json!({ "status": handle.status() }))
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let handle = state.registry.require(&id)?;
    let view = handle.view();
    let record = state.store.load(&id)?;

    ok(
        "",
        json!({
            "id": view.id,
            "status": view.status,
            "readyForAction": view.ready_for_action,
            "message_status": view.message_status(),
            "relayMessages": view.relay_messages,
            "relayMedia": view.relay_media,
            "reconnectAttempts": view.reconnect_attempts,
            "attemptLocalResume": view.attempt_local_resume,
            "record": record,
        }),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /delete-session/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let outcome = state.registry.delete(&id).await?;
    let removed = outcome == DeleteOutcome::Removed;
    ok(
        format!("Session for ID {id} deleted successfully."),
        json!({ "id": id, "wasLoaded": removed }),
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relay toggles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn toggled(outcome: ToggleOutcome) -> ApiResult {
    ok(
        format!(
            "updated successfully from {} to be {}",
            outcome.previous, outcome.current
        ),
        json!({ "message_status": outcome.message_status }),
    )
}

pub async fn toggle_message_loader(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let handle = state.registry.require(&id)?;
    toggled(handle.toggle_relay_messages().await?)
}

pub async fn toggle_media_loader(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let handle = state.registry.require(&id)?;
    toggled(handle.toggle_relay_media().await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /update-message-callback-url
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn update_message_callback_url(
    State(state): State<AppState>,
    body: Result<Json<UpdateCallbackRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let id = required(body.id, "id")?;
    let url = required(body.callback_url, "callbackUrl")?;

    let handle = state.registry.require(&id)?;
    let message_status = handle.set_message_callback_url(url).await?;
    ok(
        "callbackUrl updated successfully",
        json!({ "message_status": message_status }),
    )
}
