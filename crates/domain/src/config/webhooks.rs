use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// Bound on a single webhook POST, connect included.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            timeout_secs: d_timeout_secs(),
            user_agent: d_user_agent(),
        }
    }
}

fn d_timeout_secs() -> u64 {
    30
}
fn d_user_agent() -> String {
    "SessionRelay-Webhook/1.0".into()
}
