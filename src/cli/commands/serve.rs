use crate::server::{default_filter, init_tracing, serve};
use crate::state::AppState;

pub async fn handle(state: AppState, port: Option<u16>) -> anyhow::Result<()> {
    init_tracing(default_filter(&state));
    let port = port.unwrap_or(state.config.api.port);
    serve(state, port).await
}
