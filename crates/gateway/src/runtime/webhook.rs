//! Outbound webhook delivery.
//!
//! At most once, best effort: a payload is posted once, the outcome is
//! classified and logged, and nothing is retried or surfaced to callers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sr_domain::config::WebhooksConfig;
use sr_domain::trace::TraceEvent;

/// Where a failed delivery broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The receiver answered with a non-success status.
    ServerErrorResponse,
    /// The request went out but no response came back (refused, timed out).
    NoResponse,
    /// The request could not be built (bad URL, bad header).
    RequestSetup,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerErrorResponse => "server_error_response",
            Self::NoResponse => "no_response",
            Self::RequestSetup => "request_setup",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct WebhookFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub detail: String,
}

/// Fire-and-forget notification target.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Deliver `payload` to `url` once. Never fails from the caller's view.
    async fn notify(&self, url: &str, payload: &Value);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP dispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebhookDispatcher {
    client: reqwest::Client,
    user_agent: String,
}

impl WebhookDispatcher {
    pub fn new(config: &WebhooksConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Post once and report the outcome.
    pub async fn deliver(&self, url: &str, payload: &Value) -> Result<u16, WebhookFailure> {
        let resp = self
            .client
            .post(url)
            .header("User-Agent", &self.user_agent)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookFailure {
                kind: classify(&e),
                status: None,
                detail: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(WebhookFailure {
            kind: FailureKind::ServerErrorResponse,
            status: Some(status.as_u16()),
            detail: body,
        })
    }
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_builder() {
        FailureKind::RequestSetup
    } else {
        FailureKind::NoResponse
    }
}

#[async_trait]
impl WebhookSink for WebhookDispatcher {
    async fn notify(&self, url: &str, payload: &Value) {
        match self.deliver(url, payload).await {
            Ok(status) => {
                tracing::debug!(url = %url, status, "webhook delivered");
            }
            Err(failure) => {
                tracing::warn!(
                    url = %url,
                    kind = %failure.kind,
                    status = ?failure.status,
                    detail = %failure.detail,
                    "webhook delivery failed"
                );
                TraceEvent::WebhookFailed {
                    url: url.to_owned(),
                    kind: failure.kind.to_string(),
                    detail: failure.detail,
                }
                .emit();
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
