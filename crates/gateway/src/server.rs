//! The `serve` command: middleware stack, listener, and orderly shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;

use sr_domain::config::Config;

use crate::api;
use crate::bootstrap;
use crate::cli::pid::PidLock;

pub async fn run(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sessionrelay starting");

    let pid_lock = config
        .server
        .pid_file
        .as_deref()
        .map(PidLock::acquire)
        .transpose()
        .context("acquiring PID file")?;

    let state = bootstrap::build_app_state(config.clone()).await?;

    let max_concurrent = config.server.max_concurrent_requests.max(1);
    let mut router = api::router(state.clone())
        .layer(api::cors::layer(&config.server.cors))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http());
    if let Some(limit) = &config.server.rate_limit {
        let governor = GovernorConfigBuilder::default()
            .per_second(limit.requests_per_second)
            .burst_size(limit.burst_size)
            .finish()
            .context("server.rate_limit needs non-zero requests_per_second and burst_size")?;
        tracing::info!(
            requests_per_second = limit.requests_per_second,
            burst_size = limit.burst_size,
            "per-IP rate limiting on"
        );
        router = router.layer(GovernorLayer {
            config: Arc::new(governor),
        });
    }
    let app = router.with_state(state.clone());

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, max_concurrent, "listening");

    // Governor keys on the peer address.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    tracing::info!(sessions = state.registry.len(), "listener closed, stopping sessions");
    state.registry.shutdown().await;

    if let Some(lock) = pid_lock {
        lock.release();
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received"),
                    _ = term.recv() => tracing::info!("SIGTERM received"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("SIGINT received");
}
