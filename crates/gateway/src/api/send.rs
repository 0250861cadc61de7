//! Outbound sends.
//!
//! - `POST /send-message`
//! - `POST /send-message-multiple`
//!
//! Both accept a JSON body or `multipart/form-data`; in the multipart form the
//! `media` field carries an attachment and `message` becomes its caption.

use std::time::Duration;

use axum::async_trait;
use axum::extract::{FromRequest, Json, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use serde::Deserialize;

use sr_transport::OutgoingContent;

use super::error::{ok, ApiError, ApiResult};
use crate::runtime::send::{direct_address, send_paced};
use crate::runtime::uploads::StagedUpload;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Phone numbers arrive as strings or bare JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Phone {
    Text(String),
    Number(u64),
}

impl Phone {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhoneList {
    Many(Vec<Phone>),
    Joined(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    #[serde(default, alias = "clientId")]
    id: Option<String>,
    #[serde(default)]
    phone_number: Option<Phone>,
    #[serde(default)]
    phone_numbers: Option<PhoneList>,
    #[serde(default)]
    message: Option<String>,
}

/// A send request from either encoding. A `media` upload is already staged
/// on disk; whoever consumes the form discards it.
#[derive(Debug, Default)]
pub struct SendForm {
    pub id: Option<String>,
    pub phone_number: Option<String>,
    pub phone_numbers: Vec<String>,
    pub message: Option<String>,
    pub media: Option<StagedUpload>,
}

#[async_trait]
impl FromRequest<AppState> for SendForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return read_multipart(multipart, state).await;
        }

        let Json(body) = Json::<SendBody>::from_request(req, state).await?;
        Ok(Self {
            id: body.id,
            phone_number: body.phone_number.map(Phone::into_string),
            phone_numbers: match body.phone_numbers {
                Some(PhoneList::Many(list)) => list.into_iter().map(Phone::into_string).collect(),
                Some(PhoneList::Joined(joined)) => split_list(&joined),
                None => Vec::new(),
            },
            message: body.message,
            media: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart, state: &AppState) -> Result<SendForm, ApiError> {
    let mut form = SendForm::default();
    let mut failure = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                failure = Some(ApiError::bad_request(e.body_text()));
                break;
            }
        };
        let name = field.name().unwrap_or_default().to_owned();

        if name == "media" {
            let original = field.file_name().unwrap_or("upload").to_owned();
            let mimetype = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) => {
                    failure = Some(ApiError::bad_request(e.body_text()));
                    break;
                }
            };
            match state.uploads.stage(&original, &mimetype, &data) {
                Ok(staged) => {
                    if let Some(previous) = form.media.replace(staged) {
                        state.uploads.discard(previous).await;
                    }
                }
                Err(e) => {
                    failure = Some(ApiError::from(e));
                    break;
                }
            }
            continue;
        }

        let text = match field.text().await {
            Ok(text) => text,
            Err(e) => {
                failure = Some(ApiError::bad_request(e.body_text()));
                break;
            }
        };
        match name.as_str() {
            "id" | "clientId" => form.id = Some(text),
            "phoneNumber" => form.phone_number = Some(text),
            "phoneNumbers" => form.phone_numbers = parse_phone_list(&text),
            "message" => form.message = Some(text),
            _ => {}
        }
    }

    if let Some(err) = failure {
        if let Some(staged) = form.media.take() {
            state.uploads.discard(staged).await;
        }
        return Err(err);
    }
    Ok(form)
}

/// `["1","2"]`, `[1,2]` or `1,2`.
fn parse_phone_list(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<Phone>>(raw) {
        Ok(list) => list.into_iter().map(Phone::into_string).collect(),
        Err(_) => split_list(raw),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The upload is discarded after the send, whatever its outcome.
pub async fn send_message(State(state): State<AppState>, mut form: SendForm) -> ApiResult {
    let staged = form.media.take();
    let result = send_one(&state, form, staged.as_ref()).await;
    if let Some(staged) = staged {
        state.uploads.discard(staged).await;
    }
    result
}

pub async fn send_message_multiple(
    State(state): State<AppState>,
    mut form: SendForm,
) -> ApiResult {
    let staged = form.media.take();
    let result = send_many(&state, form, staged.as_ref()).await;
    if let Some(staged) = staged {
        state.uploads.discard(staged).await;
    }
    result
}

async fn send_one(state: &AppState, form: SendForm, staged: Option<&StagedUpload>) -> ApiResult {
    let (id, content) = validate(state, &form, staged).await?;
    let phone = form
        .phone_number
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(missing_fields)?;
    let to = direct_address(&phone, &state.config.messages.direct_suffix);

    let client = state.registry.require(&id)?.ready_client().await?;
    client.send(&to, content).await.map_err(|e| {
        tracing::warn!(session_id = %id, to = %to, error = %e, "send failed");
        ApiError::from(e)
    })?;
    ok("Message sent successfully!", serde_json::Value::Null)
}

async fn send_many(state: &AppState, form: SendForm, staged: Option<&StagedUpload>) -> ApiResult {
    let (id, content) = validate(state, &form, staged).await?;
    if form.phone_numbers.is_empty() {
        return Err(ApiError::bad_request(
            "id, phoneNumbers, and message are required",
        ));
    }
    let suffix = &state.config.messages.direct_suffix;
    let recipients: Vec<String> = form
        .phone_numbers
        .iter()
        .map(|p| direct_address(p, suffix))
        .collect();

    let client = state.registry.require(&id)?.ready_client().await?;
    let pacing = Duration::from_secs(state.config.sessions.send_pacing_secs);
    let report = send_paced(client.as_ref(), &recipients, &content, pacing).await;
    tracing::info!(session_id = %id, sent = report.sent, failed = report.failed, "multi-send finished");
    ok("Messages processed", report)
}

fn missing_fields() -> ApiError {
    ApiError::bad_request("id, phoneNumber, and message are required")
}

/// Common checks; returns the session id and the content to send.
async fn validate(
    state: &AppState,
    form: &SendForm,
    staged: Option<&StagedUpload>,
) -> Result<(String, OutgoingContent), ApiError> {
    let id = form
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(missing_fields)?;

    let content = match staged {
        Some(staged) => OutgoingContent::Media {
            blob: state.uploads.load(staged).await?,
            caption: form.message.clone().filter(|m| !m.is_empty()),
        },
        None if present(&form.message) => {
            OutgoingContent::Text(form.message.clone().unwrap_or_default())
        }
        None => return Err(missing_fields()),
    };
    Ok((id, content))
}
