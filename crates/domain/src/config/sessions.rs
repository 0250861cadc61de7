use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Pause between consecutive destinations of a multi-recipient send.
    #[serde(default = "d_send_pacing_secs")]
    pub send_pacing_secs: u64,
    /// Capacity of each session's command queue.
    #[serde(default = "d_command_buffer")]
    pub command_buffer: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            send_pacing_secs: d_send_pacing_secs(),
            command_buffer: d_command_buffer(),
        }
    }
}

/// Bring-up retry policy. The n-th retry waits `backoff_base_secs^n`
/// seconds; after `max_attempts` retries the session gives up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_backoff_base_secs")]
    pub backoff_base_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            backoff_base_secs: d_backoff_base_secs(),
        }
    }
}

fn d_send_pacing_secs() -> u64 {
    20
}
fn d_command_buffer() -> usize {
    64
}
fn d_max_attempts() -> u32 {
    5
}
fn d_backoff_base_secs() -> u64 {
    2
}
