use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use traffic_monitor::config::Config;
use traffic_monitor::metrics::{SampleStore, SnapshotPublisher, WindowMaintainer};
use traffic_monitor::{logging, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init();

    // ── 1. Build the metrics pipeline ────────────────────────────
    let store = Arc::new(SampleStore::new(config.window()));
    let publisher = SnapshotPublisher::new(store.clone());

    let maintainer = WindowMaintainer::new(store.clone()).spawn(config.tick_interval());
    let broadcaster = publisher.spawn(config.publish_interval());

    // ── 2. Build shared state & router ───────────────────────────
    let state = Arc::new(AppState::new(store, publisher.clone()));
    let app = server::create_router(state, &config.static_dir);

    // ── 3. Bind & serve ──────────────────────────────────────────
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr} (is the port already in use?)"))?;

    info!(
        %addr,
        window_secs = config.window_secs,
        tick_ms = config.tick_ms,
        publish_ms = config.publish_ms,
        history_size = config.history_size,
        "traffic monitor listening"
    );
    info!("Stats JSON      → http://{addr}/stats");
    info!("Metrics SSE     → http://{addr}/api/metrics/stream");
    info!("Metrics socket  → ws://{addr}/ws");
    info!("Test endpoint   → http://{addr}/api/test");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutting down");

            // Stop ticking first, then end every push connection so the
            // server can drain.
            maintainer.stop().await;
            broadcaster.stop().await;
            publisher.close();
        })
        .await
        .context("server exited with error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
