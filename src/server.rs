use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handlers;
use crate::state::AppState;

/// Install the global fmt subscriber; `RUST_LOG` wins over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A second init (tests, embedded use) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Default log filter for the configured environment
pub fn default_filter(state: &AppState) -> &'static str {
    if state.config.list.debug_logging {
        "agency_office=debug,audit=info,tower_http=info"
    } else {
        "agency_office=info,audit=info,tower_http=warn"
    }
}

/// Bind `0.0.0.0:port` and serve until the process is stopped
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Agency Office API listening on http://{}", bind_addr);
    axum::serve(listener, handlers::router(state)).await.context("server stopped")?;
    Ok(())
}
