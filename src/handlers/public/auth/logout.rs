// handlers/public/auth/logout.rs - POST /auth/logout handler

use axum::extract::State;
use serde_json::{json, Value};
use tower_cookies::Cookies;
use tracing::warn;

use crate::middleware::{ApiResponse, ApiResult};
use crate::session::{clear_session_cookies, cookie_value, ACCESS_COOKIE};
use crate::state::AppState;

/// POST /auth/logout - Revoke the session and clear all session cookies
///
/// Always succeeds; revocation at the provider is best effort.
pub async fn logout_post(State(state): State<AppState>, cookies: Cookies) -> ApiResult<Value> {
    if let Some(token) = cookie_value(&cookies, ACCESS_COOKIE) {
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!("sign out at provider failed: {}", e);
        }
    }
    clear_session_cookies(&cookies, state.cookie_policy());
    Ok(ApiResponse::success(json!({ "signed_out": true })))
}
