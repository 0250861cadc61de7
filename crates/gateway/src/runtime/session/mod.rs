//! One actor per managed session.
//!
//! The actor owns all mutable session state: lifecycle status, relay flags,
//! the transport client and its event stream, and the bring-up retry timer.
//! Everything else talks to it through a [`SessionHandle`]; reads go through a
//! `watch` channel carrying the latest [`SessionView`].

mod actor;
mod handle;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use sr_domain::status::{MessageStatus, SessionStatus};
use sr_sessions::{CredentialStore, SessionStore};
use sr_transport::{TransportClient, TransportError, TransportFactory};

use super::error::SessionError;
use super::ingest::MessageIngestionPipeline;
use super::reconnect::ReconnectPolicy;
use super::webhook::WebhookSink;

pub use actor::spawn;
pub use handle::SessionHandle;

/// Collaborators shared by every session actor.
#[derive(Clone)]
pub struct SessionDeps {
    pub factory: Arc<dyn TransportFactory>,
    pub store: Arc<SessionStore>,
    pub credentials: Arc<CredentialStore>,
    pub sink: Arc<dyn WebhookSink>,
    pub pipeline: Arc<MessageIngestionPipeline>,
    pub policy: ReconnectPolicy,
    pub command_buffer: usize,
}

/// What a new actor starts from.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub id: String,
    pub callback_url: String,
    pub message_callback_url: Option<String>,
    pub relay_messages: bool,
    /// Resume from stored credentials instead of pairing fresh.
    pub attempt_local_resume: bool,
    pub credentials: Option<Value>,
}

/// Read-only snapshot of a session, republished after every change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub status: SessionStatus,
    /// Latches once bring-up has settled on pairing or readiness.
    pub ready_for_action: bool,
    pub relay_messages: bool,
    pub relay_media: bool,
    pub callback_url: String,
    pub message_callback_url: Option<String>,
    pub reconnect_attempts: u32,
    pub attempt_local_resume: bool,
}

impl SessionView {
    fn new(seed: &SessionSeed) -> Self {
        Self {
            id: seed.id.clone(),
            status: SessionStatus::Pending,
            ready_for_action: false,
            relay_messages: seed.relay_messages,
            relay_media: false,
            callback_url: seed.callback_url.clone(),
            message_callback_url: seed.message_callback_url.clone(),
            reconnect_attempts: 0,
            attempt_local_resume: seed.attempt_local_resume,
        }
    }

    pub fn message_status(&self) -> MessageStatus {
        MessageStatus::from_flags(self.relay_messages, self.relay_media)
    }
}

/// Result of flipping one relay flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub previous: bool,
    pub current: bool,
    pub message_status: MessageStatus,
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

pub(crate) enum SessionCommand {
    ToggleRelayMessages {
        reply: Reply<ToggleOutcome>,
    },
    ToggleRelayMedia {
        reply: Reply<ToggleOutcome>,
    },
    SetMessageCallbackUrl {
        url: String,
        reply: Reply<MessageStatus>,
    },
    /// The transport client, only while the session is `ready`.
    Client {
        reply: Reply<Arc<dyn TransportClient>>,
    },
    /// Stop the actor, optionally destroying the transport session first.
    Teardown {
        destroy_transport: bool,
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
}
