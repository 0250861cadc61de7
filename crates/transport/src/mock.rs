//! Scriptable in-memory transport.
//!
//! Every session opened through [`MockTransport`] gets a [`MockClient`] whose
//! behavior comes from a [`MockBehavior`] script. Tests drive the event
//! stream with [`MockClient::emit`] and inspect recorded calls afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::traits::{TransportClient, TransportFactory};
use crate::types::{
    ChatSummary, InboundMessage, MediaBlob, OutgoingContent, SessionOptions, TransportEvent,
    TransportSession,
};

const EVENT_BUFFER: usize = 64;

/// Script for one mock session.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Number of leading `initialize` calls that fail.
    pub initialize_failures: u32,
    /// Events pushed once `initialize` succeeds.
    pub on_initialize: Vec<TransportEvent>,
    pub fail_destroy: bool,
    /// Recipient addresses whose `send` fails.
    pub failing_recipients: HashSet<String>,
    pub chats: Vec<ChatSummary>,
    /// Messages keyed by chat id.
    pub messages: HashMap<String, Vec<InboundMessage>>,
    /// Media keyed by message id.
    pub media: HashMap<String, MediaBlob>,
    pub credentials: Option<Value>,
    /// `open` never completes.
    pub stall_open: bool,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub content: OutgoingContent,
    pub at: Instant,
}

#[derive(Default)]
pub struct MockTransport {
    default_behavior: Mutex<MockBehavior>,
    overrides: Mutex<HashMap<String, MockBehavior>>,
    clients: Mutex<HashMap<String, Arc<MockClient>>>,
    opened: Mutex<Vec<SessionOptions>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_behavior(behavior: MockBehavior) -> Arc<Self> {
        let transport = Self::default();
        *transport.default_behavior.lock() = behavior;
        Arc::new(transport)
    }

    /// Script a single session id; other ids keep the default behavior.
    pub fn set_behavior(&self, session_id: &str, behavior: MockBehavior) {
        self.overrides.lock().insert(session_id.to_owned(), behavior);
    }

    /// The client most recently opened for `session_id`.
    pub fn client(&self, session_id: &str) -> Option<Arc<MockClient>> {
        self.clients.lock().get(session_id).cloned()
    }

    /// Options of every `open` call, in order.
    pub fn opened(&self) -> Vec<SessionOptions> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl TransportFactory for MockTransport {
    async fn open(&self, options: SessionOptions) -> Result<TransportSession, TransportError> {
        let behavior = self
            .overrides
            .lock()
            .get(&options.session_id)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.lock().clone());
        if behavior.stall_open {
            std::future::pending::<()>().await;
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::new(MockClient {
            session_id: options.session_id.clone(),
            behavior: Mutex::new(behavior),
            events: tx,
            initialize_calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });

        self.clients
            .lock()
            .insert(options.session_id.clone(), client.clone());
        self.opened.lock().push(options);

        Ok(TransportSession {
            client,
            events: rx,
        })
    }
}

pub struct MockClient {
    session_id: String,
    behavior: Mutex<MockBehavior>,
    events: mpsc::Sender<TransportEvent>,
    initialize_calls: Mutex<Vec<Instant>>,
    sent: Mutex<Vec<SentMessage>>,
    downloads: Mutex<Vec<String>>,
    destroyed: AtomicBool,
}

impl MockClient {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Push an event onto the session's stream. Returns `false` once the
    /// consumer has gone away.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Change the script of a live session.
    pub fn update_behavior(&self, f: impl FnOnce(&mut MockBehavior)) {
        f(&mut self.behavior.lock());
    }

    pub fn initialize_calls(&self) -> Vec<Instant> {
        self.initialize_calls.lock().clone()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportClient for MockClient {
    async fn initialize(&self) -> Result<(), TransportError> {
        self.initialize_calls.lock().push(Instant::now());

        let events = {
            let mut behavior = self.behavior.lock();
            if behavior.initialize_failures > 0 {
                behavior.initialize_failures -= 1;
                return Err(TransportError::Request("scripted initialize failure".into()));
            }
            behavior.on_initialize.clone()
        };

        for event in events {
            let _ = self.events.send(event).await;
        }
        Ok(())
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>, TransportError> {
        Ok(self.behavior.lock().chats.clone())
    }

    async fn messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        let behavior = self.behavior.lock();
        let all = behavior
            .messages
            .get(chat_id)
            .ok_or_else(|| TransportError::ChatNotFound(chat_id.to_owned()))?;
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn send(&self, to: &str, content: OutgoingContent) -> Result<(), TransportError> {
        let fails = self.behavior.lock().failing_recipients.contains(to);
        self.sent.lock().push(SentMessage {
            to: to.to_owned(),
            content,
            at: Instant::now(),
        });
        if fails {
            return Err(TransportError::Status {
                status: 500,
                body: format!("scripted send failure for {to}"),
            });
        }
        Ok(())
    }

    async fn download_media(&self, message_id: &str) -> Result<Option<MediaBlob>, TransportError> {
        self.downloads.lock().push(message_id.to_owned());
        Ok(self.behavior.lock().media.get(message_id).cloned())
    }

    async fn credential_snapshot(&self) -> Result<Option<Value>, TransportError> {
        Ok(self.behavior.lock().credentials.clone())
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        if self.behavior.lock().fail_destroy {
            return Err(TransportError::Request("scripted destroy failure".into()));
        }
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
