//! Tracing subscribers for the service and for one-shot CLI commands.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use sr_domain::config::ObservabilityConfig;

/// Installed subscriber. Call [`Telemetry::shutdown`] before exit so
/// batched spans reach the collector.
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Subscriber for `serve`: configured log format plus, when an OTLP
    /// endpoint is set, span export.
    pub fn init(obs: &ObservabilityConfig) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));

        let fmt = if obs.json_logs {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().compact().boxed()
        };

        let provider = otlp_provider(obs);
        let otel = provider.as_ref().map(|p| {
            tracing_opentelemetry::layer().with_tracer(p.tracer(obs.service_name.clone()))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt)
            .with(otel)
            .init();

        if let Some(endpoint) = obs.otlp_endpoint.as_deref().filter(|_| provider.is_some()) {
            tracing::info!(endpoint, sample_rate = obs.sample_rate, "exporting spans over OTLP");
        }
        Self { provider }
    }

    /// Compact stderr output at `warn`, keeping stdout for command output.
    pub fn init_cli() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = ?e, "span exporter shutdown failed");
            }
        }
    }
}

fn otlp_provider(obs: &ObservabilityConfig) -> Option<SdkTracerProvider> {
    let endpoint = obs.otlp_endpoint.as_deref()?;
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            // The subscriber is not installed yet.
            eprintln!("warning: OTLP exporter for {endpoint} unavailable ({e}); spans stay local");
            return None;
        }
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(obs.service_name.clone())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(Sampler::TraceIdRatioBased(obs.sample_rate))
            .with_resource(resource)
            .build(),
    )
}
