//! Control-API response envelope.
//!
//! Every response is `{success, message, status, data}`; the HTTP status and
//! the `status` field always agree.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use sr_transport::TransportError;

use crate::runtime::SessionError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match &err {
            SessionError::Validation(_)
            | SessionError::AlreadyExists(_)
            | SessionError::NotReady(_)
            | SessionError::NotReadyForAction(_) => Self::bad_request(err.to_string()),
            SessionError::NotFound(_) => Self::not_found(err.to_string()),
            SessionError::Transport(TransportError::ChatNotFound(chat)) => {
                Self::not_found(format!("chat {chat} not found"))
            }
            SessionError::Transport(_) | SessionError::Store(_) | SessionError::Shutdown(_) => {
                tracing::error!(error = %err, "dependency failure");
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err).into()
    }
}

/// Malformed bodies and wrong content types keep the envelope.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<sr_domain::error::Error> for ApiError {
    fn from(err: sr_domain::error::Error) -> Self {
        SessionError::Store(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": self.message,
            "status": self.status.as_u16(),
            "data": Value::Null,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;

/// `200` envelope around `data`.
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult {
    let data = serde_json::to_value(data)
        .map_err(|e| ApiError::internal(format!("serializing response: {e}")))?;
    let body = json!({
        "success": true,
        "message": message.into(),
        "status": 200,
        "data": data,
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (SessionError::Validation("x".into()), 400),
            (SessionError::AlreadyExists("a".into()), 400),
            (SessionError::NotReady("a".into()), 400),
            (SessionError::NotReadyForAction("a".into()), 400),
            (SessionError::NotFound("a".into()), 404),
            (
                SessionError::Transport(TransportError::ChatNotFound("c".into())),
                404,
            ),
            (SessionError::Transport(TransportError::Closed), 500),
            (SessionError::Shutdown("a".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).status.as_u16(), code);
        }
    }
}
