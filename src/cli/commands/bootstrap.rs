use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::{bootstrap_admin, AdminBootstrap};
use crate::state::AppState;

pub async fn handle(
    state: AppState,
    email: String,
    full_name: String,
    password: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => std::env::var("AGENCY_ADMIN_PASSWORD")
            .map_err(|_| anyhow::anyhow!("Pass --password or set AGENCY_ADMIN_PASSWORD"))?,
    };

    let request = AdminBootstrap { email, password, full_name };
    let outcome = bootstrap_admin(state.store.as_ref(), state.auth.as_ref(), &request).await?;

    output_success(
        &output_format,
        &format!("Administrator {} created", request.email),
        Some(json!({
            "user_id": outcome.user.id,
            "role_id": outcome.role_id,
            "role_created": outcome.role_created,
            "grants_added": outcome.grants_added
        })),
    )
}
