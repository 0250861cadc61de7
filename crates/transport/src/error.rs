/// Failures reported by a transport implementation.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),

    #[error("transport returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport protocol error: {0}")]
    Protocol(String),

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("transport session closed")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
