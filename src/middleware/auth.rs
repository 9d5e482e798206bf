use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use tracing::debug;

use crate::auth::{verify_token, AuthError};
use crate::error::ApiError;
use crate::services::load_actor;
use crate::session::{clear_session_cookies, cookie_value, ACCESS_COOKIE};
use crate::state::AppState;

/// Session middleware for `/api/*`.
///
/// Accepts the `access_token` cookie or an `Authorization: Bearer` header,
/// verifies it, loads the actor and inserts it into request extensions.
/// A dead token tears the session down.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers)?
        .or_else(|| cookie_value(&cookies, ACCESS_COOKIE))
        .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;

    let claims = match verify_token(&state.config.auth, &token) {
        Ok(claims) => claims,
        Err(e @ (AuthError::Expired | AuthError::InvalidToken(_))) => {
            debug!("tearing down session: {}", e);
            clear_session_cookies(&cookies, state.cookie_policy());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let actor = match load_actor(state.store.as_ref(), &claims.sub).await? {
        Some(actor) => actor,
        None => {
            clear_session_cookies(&cookies, state.cookie_policy());
            return Err(ApiError::unauthorized("No user profile for this account"));
        }
    };
    if !actor.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Bearer token from the Authorization header, if one was sent
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty bearer token")),
        None => Err(ApiError::unauthorized("Authorization header must use Bearer token format")),
    }
}
