use agency_office::config;
use agency_office::server::{default_filter, init_tracing, serve};
use agency_office::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up BACKEND_* and AUTH_JWT_SECRET
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    let port = config.api.port;

    let state = AppState::from_config(config)?;
    init_tracing(default_filter(&state));
    tracing::info!("Starting Agency Office API in {:?} mode", state.config.environment);

    serve(state, port).await
}
