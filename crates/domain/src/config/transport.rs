use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messaging transport bridge
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// HTTP base URL of the messaging bridge sidecar.
    #[serde(default = "d_bridge_url")]
    pub bridge_url: String,
    /// WebSocket base URL for session event streams. Derived from
    /// `bridge_url` (`http` -> `ws`) when unset.
    #[serde(default)]
    pub events_url: Option<String>,
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: d_bridge_url(),
            events_url: None,
            request_timeout_secs: d_request_timeout_secs(),
        }
    }
}

fn d_bridge_url() -> String {
    "http://127.0.0.1:3100".into()
}
fn d_request_timeout_secs() -> u64 {
    60
}
