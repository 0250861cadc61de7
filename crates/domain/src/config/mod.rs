mod messages;
mod observability;
mod server;
mod sessions;
mod storage;
mod transport;
mod webhooks;

pub use messages::*;
pub use observability::*;
pub use server::*;
pub use sessions::*;
pub use storage::*;
pub use transport::*;
pub use webhooks::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

const MAX_BACKOFF_BASE_SECS: u64 = 60;
const MAX_RECONNECT_ATTEMPTS: u32 = 50;

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }

        if self.transport.bridge_url.is_empty() {
            errors.push(ConfigError::error(
                "transport.bridge_url",
                "bridge_url must not be empty",
            ));
        } else if !self.transport.bridge_url.starts_with("http://")
            && !self.transport.bridge_url.starts_with("https://")
        {
            errors.push(ConfigError::error(
                "transport.bridge_url",
                "bridge_url must be an http(s) URL",
            ));
        }

        if !self.messages.media_mount.starts_with('/') || self.messages.media_mount.len() < 2 {
            errors.push(ConfigError::error(
                "messages.media_mount",
                "media_mount must be an absolute path such as \"/media\"",
            ));
        }

        if let Some(tz) = &self.messages.timezone {
            if tz.trim().is_empty() {
                errors.push(ConfigError::error("messages.timezone", "timezone must not be empty"));
            }
        }

        if self.sessions.command_buffer == 0 {
            errors.push(ConfigError::error(
                "sessions.command_buffer",
                "command_buffer must be greater than 0",
            ));
        }

        let reconnect = &self.sessions.reconnect;
        if reconnect.backoff_base_secs == 0 || reconnect.backoff_base_secs > MAX_BACKOFF_BASE_SECS {
            errors.push(ConfigError::error(
                "sessions.reconnect.backoff_base_secs",
                format!("backoff base must be between 1 and {MAX_BACKOFF_BASE_SECS} seconds"),
            ));
        }
        if reconnect.max_attempts > MAX_RECONNECT_ATTEMPTS {
            errors.push(ConfigError::error(
                "sessions.reconnect.max_attempts",
                format!("max_attempts must be at most {MAX_RECONNECT_ATTEMPTS}"),
            ));
        }

        if self.sessions.send_pacing_secs == 0 {
            errors.push(ConfigError::warning(
                "sessions.send_pacing_secs",
                "multi-recipient sends are not paced; the transport may throttle the account",
            ));
        }

        if self.webhooks.timeout_secs == 0 {
            errors.push(ConfigError::error(
                "webhooks.timeout_secs",
                "webhook timeout must be greater than 0",
            ));
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 || rl.burst_size == 0 {
                errors.push(ConfigError::error(
                    "server.rate_limit",
                    "requests_per_second and burst_size must be greater than 0",
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        errors
    }
}
