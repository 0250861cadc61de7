//! Application state wiring.
//!
//! [`build_app_state`] is the production boot path. [`assemble`] takes the
//! transport and webhook sink as parameters so tests can wire in fakes.

use std::sync::Arc;

use anyhow::Context;

use sr_domain::config::{Config, ConfigSeverity};
use sr_sessions::{CredentialStore, MediaStore, SessionStore};
use sr_transport::bridge::BridgeTransport;
use sr_transport::TransportFactory;

use crate::api::auth::hash_passkey;
use crate::runtime::ingest::MessageIngestionPipeline;
use crate::runtime::reconnect::ReconnectPolicy;
use crate::runtime::uploads::UploadStaging;
use crate::runtime::webhook::{WebhookDispatcher, WebhookSink};
use crate::runtime::{SessionDeps, SessionRegistry};
use crate::state::AppState;

/// Validate config, open the stores, recover persisted sessions and return a
/// fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Transport bridge ─────────────────────────────────────────────
    let transport = BridgeTransport::from_config(&config.transport)
        .context("initializing transport bridge")?;
    tracing::info!(bridge = %config.transport.bridge_url, "transport bridge configured");

    // ── Webhook dispatcher ───────────────────────────────────────────
    let dispatcher =
        WebhookDispatcher::new(&config.webhooks).context("building webhook client")?;

    // ── Passkey (read once, hashed for constant-time comparison) ─────
    let env_var = &config.server.passkey_env;
    let passkey = std::env::var(env_var).ok().filter(|t| !t.is_empty());
    match passkey {
        Some(_) => tracing::info!(source = %format!("env:{env_var}"), "control API passkey enabled"),
        None => tracing::warn!("control API passkey DISABLED, set the {env_var} env var"),
    }

    let state = assemble(
        config,
        Arc::new(transport),
        Arc::new(dispatcher),
        passkey.as_deref(),
    )?;

    // ── Recovery ─────────────────────────────────────────────────────
    let report = state
        .registry
        .recover()
        .await
        .context("recovering persisted sessions")?;
    tracing::info!(
        recovered = report.recovered,
        skipped = report.skipped,
        "persisted sessions recovered"
    );

    Ok(state)
}

/// Wire stores, runtime and API state around the given collaborators.
/// Does not recover persisted sessions.
pub fn assemble(
    config: Arc<Config>,
    factory: Arc<dyn TransportFactory>,
    sink: Arc<dyn WebhookSink>,
    passkey: Option<&str>,
) -> anyhow::Result<AppState> {
    let storage = &config.storage;

    // ── Durable stores ───────────────────────────────────────────────
    let store = Arc::new(
        SessionStore::new(&storage.state_path).context("initializing session store")?,
    );
    let credentials = Arc::new(
        CredentialStore::new(&storage.state_path).context("initializing credential store")?,
    );
    let media = Arc::new(
        MediaStore::new(&storage.media_path).context("initializing media store")?,
    );
    let uploads = Arc::new(
        UploadStaging::new(&storage.uploads_path).context("initializing upload staging")?,
    );
    tracing::info!(state = %storage.state_path.display(), "session stores ready");

    // ── Runtime ──────────────────────────────────────────────────────
    let pipeline = Arc::new(
        MessageIngestionPipeline::new(media.clone(), &config.messages)
            .context("initializing message pipeline")?,
    );
    let deps = SessionDeps {
        factory,
        store: store.clone(),
        credentials,
        sink,
        pipeline: pipeline.clone(),
        policy: ReconnectPolicy::from_config(&config.sessions.reconnect),
        command_buffer: config.sessions.command_buffer,
    };
    let registry = Arc::new(SessionRegistry::new(deps));

    Ok(AppState {
        config,
        registry,
        store,
        pipeline,
        media,
        uploads,
        passkey_hash: passkey.filter(|p| !p.is_empty()).map(hash_passkey),
    })
}
