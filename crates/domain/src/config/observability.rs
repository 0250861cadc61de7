use serde::{Deserialize, Serialize};

/// Log output and optional trace export for `serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
    /// One JSON object per line; `false` switches to compact text.
    #[serde(default = "d_json_logs")]
    pub json_logs: bool,
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`. Export is off
    /// while this is unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// Ratio-based sampling between 0.0 and 1.0.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: d_log_filter(),
            json_logs: d_json_logs(),
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_log_filter() -> String {
    "info,sr_gateway=debug".into()
}

fn d_json_logs() -> bool {
    true
}

fn d_service_name() -> String {
    "sessionrelay".into()
}

fn d_sample_rate() -> f64 {
    1.0
}
