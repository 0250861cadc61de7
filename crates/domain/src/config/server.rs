use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP listener
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Name of the env var carrying the control-API passkey. An empty or
    /// missing value leaves `/api/client` open.
    #[serde(default = "d_passkey_env")]
    pub passkey_env: String,
    /// Per-client-IP throttling; off unless configured.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default = "d_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Locked exclusively while the process runs.
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            cors: CorsConfig::default(),
            passkey_env: d_passkey_env(),
            rate_limit: None,
            max_concurrent_requests: d_max_concurrent_requests(),
            pid_file: None,
        }
    }
}

/// Token bucket: refills `requests_per_second`, holds at most `burst_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins, `scheme://host:*` for any port, or a lone `"*"`.
    #[serde(default = "d_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_allowed_origins(),
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    3000
}
fn d_allowed_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_passkey_env() -> String {
    "SR_PASSKEY".into()
}
fn d_max_concurrent_requests() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
        assert_eq!(cfg.passkey_env, "SR_PASSKEY");
        assert!(cfg.rate_limit.is_none());
        assert!(cfg.pid_file.is_none());
    }

    #[test]
    fn rate_limit_table_parses() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            port = 8080

            [rate_limit]
            requests_per_second = 10
            burst_size = 40
            "#,
        )
        .unwrap();
        let limit = cfg.rate_limit.as_ref().unwrap();
        assert_eq!((limit.requests_per_second, limit.burst_size), (10, 40));
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
    }
}
