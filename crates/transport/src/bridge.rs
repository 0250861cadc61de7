//! Transport backed by an external messaging bridge sidecar.
//!
//! Commands are REST calls under `<bridge_url>/sessions/<id>`; events arrive
//! as JSON text frames on `<events_url>/sessions/<id>/events`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use sr_domain::config::TransportConfig;

use crate::error::TransportError;
use crate::traits::{TransportClient, TransportFactory};
use crate::types::{
    ChatSummary, InboundMessage, MediaBlob, OutgoingContent, SessionOptions, TransportEvent,
    TransportSession,
};

const EVENT_BUFFER: usize = 256;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire format
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One event frame pushed by the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeFrame {
    #[serde(alias = "pairing")]
    Qr { token: String },
    Ready,
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Message { message: InboundMessage },
}

impl From<BridgeFrame> for TransportEvent {
    fn from(frame: BridgeFrame) -> Self {
        match frame {
            BridgeFrame::Qr { token } => TransportEvent::PairingRequired { token },
            BridgeFrame::Ready => TransportEvent::Ready,
            BridgeFrame::Disconnected { reason } => TransportEvent::Disconnected { reason },
            BridgeFrame::AuthFailure { message } => TransportEvent::AuthFailure { message },
            BridgeFrame::Message { message } => TransportEvent::Message(message),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenRequest<'a> {
    resume: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<&'a Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMedia {
    mimetype: String,
    /// Base64 payload.
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<WireMedia>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Factory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BridgeTransport {
    http: reqwest::Client,
    base_url: Url,
    events_url: Url,
    /// Bound on the event-stream handshake.
    connect_timeout: Duration,
}

impl BridgeTransport {
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = parse_base(&config.bridge_url)?;
        let events_url = match &config.events_url {
            Some(url) => parse_base(url)?,
            None => parse_base(&derive_events_url(&config.bridge_url))?,
        };
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            events_url,
            connect_timeout: timeout,
        })
    }
}

#[async_trait]
impl TransportFactory for BridgeTransport {
    async fn open(&self, options: SessionOptions) -> Result<TransportSession, TransportError> {
        let id = options.session_id.as_str();

        // Subscribe before registering so no early event is missed.
        let ws_url = endpoint(&self.events_url, &["sessions", id, "events"])?;
        let (ws, _) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(ws_url.as_str()))
                .await
                .map_err(|_| {
                    TransportError::Request(format!(
                        "event stream {ws_url}: handshake timed out after {}s",
                        self.connect_timeout.as_secs()
                    ))
                })?
                .map_err(|e| TransportError::Request(format!("event stream {ws_url}: {e}")))?;

        let open_url = endpoint(&self.base_url, &["sessions", id])?;
        let resp = self
            .http
            .post(open_url)
            .json(&OpenRequest {
                resume: options.resume,
                credentials: options.credentials.as_ref(),
            })
            .send()
            .await?;
        check(resp).await?;

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump_events(id.to_owned(), ws, tx, cancel.clone()));

        tracing::debug!(session_id = %id, resume = options.resume, "bridge session opened");

        let client = Arc::new(BridgeClient {
            session_id: options.session_id.clone(),
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            cancel,
        });
        Ok(TransportSession { client, events: rx })
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Forward event frames until the socket closes, the consumer goes away, or
/// the client is destroyed. An unexpected close becomes a `Disconnected`.
async fn pump_events(
    session_id: String,
    ws: WsStream,
    tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let (mut write, mut read) = ws.split();

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<BridgeFrame>(&text) {
                        Ok(frame) => {
                            if tx.send(frame.into()).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(session_id = %session_id, error = %e, "ignoring unknown bridge frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "event stream closed".into());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("event stream error: {e}"),
                None => break "event stream closed".into(),
            }
        }
    };

    if !cancel.is_cancelled() {
        tracing::warn!(session_id = %session_id, reason = %reason, "bridge event stream ended");
        let _ = tx.send(TransportEvent::Disconnected { reason }).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BridgeClient {
    session_id: String,
    http: reqwest::Client,
    base_url: Url,
    cancel: CancellationToken,
}

impl BridgeClient {
    fn url(&self, tail: &[&str]) -> Result<Url, TransportError> {
        let mut segments = vec!["sessions", self.session_id.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl TransportClient for BridgeClient {
    async fn initialize(&self) -> Result<(), TransportError> {
        let resp = self.http.post(self.url(&["initialize"])?).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>, TransportError> {
        let resp = self.http.get(self.url(&["chats"])?).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        let mut url = self.url(&["chats", chat_id, "messages"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(TransportError::ChatNotFound(chat_id.to_owned()));
        }
        Ok(check(resp).await?.json().await?)
    }

    async fn send(&self, to: &str, content: OutgoingContent) -> Result<(), TransportError> {
        let body = match &content {
            OutgoingContent::Text(text) => SendRequest {
                to,
                text: Some(text),
                caption: None,
                media: None,
            },
            OutgoingContent::Media { blob, caption } => SendRequest {
                to,
                text: None,
                caption: caption.as_deref(),
                media: Some(WireMedia {
                    mimetype: blob.mimetype.clone(),
                    data: BASE64.encode(&blob.data),
                    filename: blob.filename.clone(),
                }),
            },
        };
        let resp = self.http.post(self.url(&["messages"])?).json(&body).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn download_media(&self, message_id: &str) -> Result<Option<MediaBlob>, TransportError> {
        let resp = self
            .http
            .get(self.url(&["messages", message_id, "media"])?)
            .send()
            .await?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::NO_CONTENT) {
            return Ok(None);
        }
        let wire: WireMedia = check(resp).await?.json().await?;
        let data = BASE64
            .decode(wire.data.as_bytes())
            .map_err(|e| TransportError::Protocol(format!("media payload: {e}")))?;
        Ok(Some(MediaBlob {
            mimetype: wire.mimetype,
            data,
            filename: wire.filename,
        }))
    }

    async fn credential_snapshot(&self) -> Result<Option<Value>, TransportError> {
        let resp = self.http.get(self.url(&["credentials"])?).send().await?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::NO_CONTENT) {
            return Ok(None);
        }
        Ok(Some(check(resp).await?.json().await?))
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        let resp = self.http.delete(self.url(&[])?).send().await;
        self.cancel.cancel();
        check(resp?).await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_base(raw: &str) -> Result<Url, TransportError> {
    Url::parse(raw).map_err(|e| TransportError::Request(format!("invalid bridge url {raw:?}: {e}")))
}

/// `http://host` becomes `ws://host`, `https://host` becomes `wss://host`.
fn derive_events_url(bridge_url: &str) -> String {
    if let Some(rest) = bridge_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = bridge_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        bridge_url.to_owned()
    }
}

/// Append percent-encoded path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TransportError::Request(format!("bridge url {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_map_to_events() {
        let qr: BridgeFrame = serde_json::from_str(r#"{"type":"qr","token":"2@abc"}"#).unwrap();
        assert_eq!(
            TransportEvent::from(qr),
            TransportEvent::PairingRequired { token: "2@abc".into() }
        );

        let gone: BridgeFrame =
            serde_json::from_str(r#"{"type":"disconnected","reason":"LOGOUT"}"#).unwrap();
        assert_eq!(
            TransportEvent::from(gone),
            TransportEvent::Disconnected { reason: "LOGOUT".into() }
        );

        let msg: BridgeFrame = serde_json::from_str(
            r#"{"type":"message","message":{"id":"m1","body":"hi","from":"1@c.us","to":"2@c.us","timestamp":1700000000,"hasMedia":true}}"#,
        )
        .unwrap();
        match TransportEvent::from(msg) {
            TransportEvent::Message(m) => {
                assert_eq!(m.id, "m1");
                assert!(m.has_media);
                assert!(!m.from_me);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<BridgeFrame>(r#"{"type":"battery","level":3}"#).is_err());
    }

    #[test]
    fn events_url_follows_scheme() {
        assert_eq!(derive_events_url("http://127.0.0.1:3100"), "ws://127.0.0.1:3100");
        assert_eq!(derive_events_url("https://bridge.example"), "wss://bridge.example");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let base = Url::parse("http://bridge:3100/api/").unwrap();
        let url = endpoint(&base, &["sessions", "t 1", "chats", "123@c.us"]).unwrap();
        assert_eq!(url.as_str(), "http://bridge:3100/api/sessions/t%201/chats/123@c.us");
    }
}
