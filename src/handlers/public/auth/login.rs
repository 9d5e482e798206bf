// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::info;

use crate::entity::ValidationErrors;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::AppSession;
use crate::state::AppState;

use super::establish_session;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/**
 * POST /auth/login - Sign in with email and password
 *
 * Expected Input:
 * ```json
 * { "email": "staff@example.com", "password": "..." }
 * ```
 *
 * On success sets `access_token`, `refresh_token` and `user_profile`
 * cookies and returns the profile with application settings. Inactive
 * accounts get 403 and no cookies.
 */
pub async fn login_post(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> ApiResult<AppSession> {
    let mut errors = ValidationErrors::new();
    if body.email.trim().is_empty() {
        errors.add("email", "This field is required");
    }
    if body.password.is_empty() {
        errors.add("password", "This field is required");
    }
    errors.into_result()?;

    let session = state.auth.sign_in(body.email.trim(), &body.password).await?;
    let app_session = establish_session(&state, &cookies, session).await?;
    info!("{} signed in", app_session.profile.email);
    Ok(ApiResponse::success(app_session))
}
