pub mod auth;
pub mod chats;
pub mod cors;
pub mod error;
pub mod send;
pub mod sessions;

use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Build the full API router.
///
/// Control routes live under `/api/client` behind the passkey middleware.
/// `/health` and the static media mount are public.
pub fn router(state: AppState) -> Router<AppState> {
    let client = Router::new()
        // Lifecycle
        .route("/create-session", post(sessions::create_session))
        .route("/get-status/:id", get(sessions::get_status))
        .route("/get-session/:id", get(sessions::get_session))
        .route("/delete-session/:id", delete(sessions::delete_session))
        // Relay flags
        .route("/toggle-message-loader/:id", get(sessions::toggle_message_loader))
        .route("/toggle-media-loader/:id", get(sessions::toggle_media_loader))
        .route("/toggle-medial-loader/:id", get(sessions::toggle_media_loader))
        .route(
            "/update-message-callback-url",
            post(sessions::update_message_callback_url),
        )
        // Reads
        .route("/get-chats/:id", get(chats::get_chats))
        .route("/get-messages/:chat_id/:id/:limit", get(chats::get_messages))
        .route(
            "/get-messages-with-media/:chat_id/:id/:limit",
            get(chats::get_messages_with_media),
        )
        // Sends
        .route("/send-message", post(send::send_message))
        .route("/send-message-multiple", post(send::send_message_multiple))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_passkey,
        ));

    let media = ServeDir::new(state.media.root());
    let mount = state.config.messages.media_mount.trim_end_matches('/');

    Router::new()
        .route("/health", get(health))
        .nest("/api/client", client)
        .nest_service(mount, media)
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": state.registry.len(),
    }))
}
