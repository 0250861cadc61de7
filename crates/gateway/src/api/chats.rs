//! Chat and message reads. All require a `ready` session.
//!
//! - `GET /get-chats/:id`
//! - `GET /get-messages/:chatId/:id/:limit`
//! - `GET /get-messages-with-media/:chatId/:id/:limit`

use axum::extract::{Path, State};
use serde_json::Value;

use super::error::{ok, ApiError, ApiResult};
use crate::state::AppState;

fn parse_limit(raw: &str) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ApiError::bad_request("limit must be a positive integer"))
}

pub async fn get_chats(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let client = state.registry.require(&id)?.ready_client().await?;
    let chats = client.chats().await?;
    let data: Vec<Value> = chats
        .iter()
        .map(|chat| state.pipeline.chat_summary(chat))
        .collect();
    ok("", data)
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path((chat_id, id, limit)): Path<(String, String, String)>,
) -> ApiResult {
    let limit = parse_limit(&limit)?;
    let client = state.registry.require(&id)?.ready_client().await?;
    let messages = client.messages(&chat_id, limit).await?;
    let data: Vec<Value> = messages
        .iter()
        .map(|m| state.pipeline.listing_entry(m))
        .collect();
    ok("", data)
}

/// Full metadata per message. Media is downloaded and stored first, so
/// `mediaUrl` points at the static mount when the download succeeds.
pub async fn get_messages_with_media(
    State(state): State<AppState>,
    Path((chat_id, id, limit)): Path<(String, String, String)>,
) -> ApiResult {
    let limit = parse_limit(&limit)?;
    let client = state.registry.require(&id)?.ready_client().await?;
    let messages = client.messages(&chat_id, limit).await?;

    let mut data = Vec::with_capacity(messages.len());
    for message in &messages {
        let media_url = if message.has_media {
            state
                .pipeline
                .fetch_media(&id, client.as_ref(), message)
                .await
                .map(|filename| state.pipeline.media_url(&filename))
        } else {
            None
        };
        data.push(state.pipeline.metadata_payload(&id, message, media_url));
    }
    ok("", data)
}
