// handlers/public/auth/refresh.rs - POST /auth/refresh handler

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::{clear_session_cookies, cookie_value, AppSession, REFRESH_COOKIE};
use crate::state::AppState;

use super::establish_session;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /auth/refresh - Exchange the refresh token for a new session
///
/// The token comes from the `refresh_token` cookie, or from the body for
/// non-browser clients. A rejected token clears the session cookies.
pub async fn refresh_post(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<AppSession> {
    let token = body
        .and_then(|Json(b)| b.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_value(&cookies, REFRESH_COOKIE))
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    let result = match state.auth.refresh(&token).await {
        Ok(session) => establish_session(&state, &cookies, session).await,
        Err(e) => Err(match ApiError::from(e) {
            ApiError::Unauthorized(_) => ApiError::session_expired("Session expired, please sign in again"),
            other => other,
        }),
    };
    if let Err(ApiError::SessionExpired(_) | ApiError::Forbidden(_)) = &result {
        clear_session_cookies(&cookies, state.cookie_policy());
    }
    result.map(ApiResponse::success)
}
