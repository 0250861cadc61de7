use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::types::{
    ChatSummary, InboundMessage, MediaBlob, OutgoingContent, SessionOptions, TransportSession,
};

/// Opens transport sessions.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self, options: SessionOptions) -> Result<TransportSession, TransportError>;
}

/// Operations on one open transport session.
///
/// Every call is bounded by the implementation's own timeouts.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Start bring-up. Pairing and readiness are reported on the event stream,
    /// possibly before this returns.
    async fn initialize(&self) -> Result<(), TransportError>;

    async fn chats(&self) -> Result<Vec<ChatSummary>, TransportError>;

    /// Most recent `limit` messages of `chat_id`, oldest first.
    async fn messages(&self, chat_id: &str, limit: usize)
        -> Result<Vec<InboundMessage>, TransportError>;

    async fn send(&self, to: &str, content: OutgoingContent) -> Result<(), TransportError>;

    /// `Ok(None)` when the message has no retrievable media.
    async fn download_media(&self, message_id: &str) -> Result<Option<MediaBlob>, TransportError>;

    /// Opaque credentials that let a later `open` resume without pairing.
    async fn credential_snapshot(&self) -> Result<Option<Value>, TransportError>;

    /// Log out and release the session on the transport side.
    async fn destroy(&self) -> Result<(), TransportError>;
}
