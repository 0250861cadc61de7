use serde::Serialize;

/// Structured trace events emitted across the sessionrelay crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        resume: bool,
    },
    SessionStatusChanged {
        session_id: String,
        from: String,
        to: String,
    },
    ReconnectScheduled {
        session_id: String,
        attempt: u32,
        delay_ms: u64,
    },
    SessionDeleted {
        session_id: String,
        teardown_ok: bool,
    },
    SessionsRecovered {
        recovered: usize,
        skipped: usize,
    },
    WebhookFailed {
        url: String,
        kind: String,
        detail: String,
    },
    MediaStored {
        session_id: String,
        filename: String,
        bytes: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sr_event");
    }
}
