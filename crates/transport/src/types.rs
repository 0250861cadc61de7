use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::traits::TransportClient;

/// Everything a transport needs to open one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub session_id: String,
    /// Try to resume from `credentials` instead of pairing from scratch.
    pub resume: bool,
    pub credentials: Option<Value>,
}

/// A freshly opened transport session: the command surface plus its event
/// stream. The stream ends when the transport lets go of the session.
pub struct TransportSession {
    pub client: Arc<dyn TransportClient>,
    pub events: mpsc::Receiver<TransportEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A pairing handshake is needed; `token` is shown to the user out of band.
    PairingRequired { token: String },
    Ready,
    Disconnected { reason: String },
    AuthFailure { message: String },
    Message(InboundMessage),
}

/// A message as reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    #[serde(default)]
    pub body: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub from_me: bool,
    /// The message quotes another one.
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub has_media: bool,
    /// Unix seconds.
    pub timestamp: i64,
    /// Sent to the status broadcast list.
    #[serde(default)]
    pub is_status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub last_message: Option<InboundMessage>,
}

/// Downloaded media of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub mimetype: String,
    pub data: Vec<u8>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingContent {
    Text(String),
    Media {
        blob: MediaBlob,
        caption: Option<String>,
    },
}
