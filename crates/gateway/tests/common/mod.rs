//! Shared fixtures: a scripted transport, a recording webhook sink and a
//! fully assembled `AppState` over a temp directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use sr_domain::config::Config;
use sr_domain::status::SessionStatus;
use sr_gateway::bootstrap::assemble;
use sr_gateway::runtime::webhook::WebhookSink;
use sr_gateway::runtime::{NewSession, SessionHandle, SessionRegistry, SessionView};
use sr_gateway::state::AppState;
use sr_transport::mock::{MockBehavior, MockClient, MockTransport};
use sr_transport::InboundMessage;

pub const CALLBACK: &str = "http://hooks.test/lifecycle";
pub const MESSAGES: &str = "http://hooks.test/messages";

// ── Recording sink ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(String, Value)>>,
    /// Time each delivery takes after it is recorded.
    delay: Mutex<Option<Duration>>,
}

#[async_trait]
impl WebhookSink for RecordingSink {
    async fn notify(&self, url: &str, payload: &Value) {
        self.calls.lock().push((url.to_owned(), payload.clone()));
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl RecordingSink {
    /// Make every later delivery take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Payloads delivered to `url`, in order.
    pub fn to(&self, url: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// `status` field of every lifecycle notification for `session_id`.
    pub fn statuses(&self, session_id: &str) -> Vec<String> {
        self.to(CALLBACK)
            .iter()
            .filter(|p| p["sessionId"] == session_id)
            .filter_map(|p| p["status"].as_str().map(str::to_owned))
            .collect()
    }
}

// ── Harness ────────────────────────────────────────────────────────────

pub struct Harness {
    pub dir: TempDir,
    pub transport: Arc<MockTransport>,
    pub sink: Arc<RecordingSink>,
    pub state: AppState,
}

impl Harness {
    pub fn new(behavior: MockBehavior) -> Self {
        Self::build(behavior, |_| {}, None)
    }

    pub fn build(
        behavior: MockBehavior,
        tweak: impl FnOnce(&mut Config),
        passkey: Option<&str>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.state_path = dir.path().join("state");
        config.storage.media_path = dir.path().join("media");
        config.storage.uploads_path = dir.path().join("uploads");
        config.messages.timezone = Some("UTC".into());
        tweak(&mut config);

        let transport = MockTransport::with_behavior(behavior);
        let sink = Arc::new(RecordingSink::default());
        let state = assemble(Arc::new(config), transport.clone(), sink.clone(), passkey).unwrap();

        Self {
            dir,
            transport,
            sink,
            state,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.state.registry
    }

    pub fn app(&self) -> Router {
        sr_gateway::api::router(self.state.clone()).with_state(self.state.clone())
    }

    pub async fn create(&self, id: &str, message_callback_url: Option<&str>) -> SessionHandle {
        self.registry()
            .create(NewSession {
                id: id.into(),
                callback_url: CALLBACK.into(),
                message_callback_url: message_callback_url.map(str::to_owned),
            })
            .await
            .unwrap()
    }

    /// The mock client once the actor has opened its transport session.
    pub async fn client(&self, id: &str) -> Arc<MockClient> {
        eventually(|| self.transport.client(id).is_some()).await;
        self.transport.client(id).unwrap()
    }

    /// Create a session whose transport reports ready straight away.
    pub async fn ready_session(&self, id: &str, message_callback_url: Option<&str>) -> SessionHandle {
        let handle = self.create(id, message_callback_url).await;
        let client = self.client(id).await;
        client.emit(sr_transport::TransportEvent::Ready).await;
        wait_status(&handle, SessionStatus::Ready).await;
        handle
    }
}

// ── Waiting ────────────────────────────────────────────────────────────

/// Poll `cond` until it holds. Works with a paused clock too.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub async fn wait_status(handle: &SessionHandle, status: SessionStatus) -> SessionView {
    tokio::time::timeout(Duration::from_secs(24 * 60 * 60), handle.wait_for(|v| v.status == status))
        .await
        .expect("status not reached in time")
        .expect("session actor stopped")
}

pub fn message(id: &str, has_media: bool) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        body: format!("body of {id}"),
        from: "923001234567@c.us".into(),
        to: "923007654321@c.us".into(),
        from_me: false,
        is_reply: false,
        has_media,
        timestamp: 1_700_000_000,
        is_status: false,
    }
}
