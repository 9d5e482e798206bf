// handlers/public/auth/mod.rs - Session acquisition and teardown

pub mod login;
pub mod logout;
pub mod refresh;

pub use login::login_post;
pub use logout::logout_post;
pub use refresh::refresh_post;

use tower_cookies::Cookies;
use tracing::warn;

use crate::auth::AuthSession;
use crate::error::ApiError;
use crate::services::{load_actor, load_session};
use crate::session::{set_session_cookies, AppSession};
use crate::state::AppState;

/// Turn provider tokens into a back-office session: load the profile,
/// refuse inactive accounts, then set the cookies. A refused session is
/// revoked and leaves the cookie jar untouched.
pub(crate) async fn establish_session(
    state: &AppState,
    cookies: &Cookies,
    session: AuthSession,
) -> Result<AppSession, ApiError> {
    let actor = match load_actor(state.store.as_ref(), &session.user.id).await? {
        Some(actor) if actor.is_active => actor,
        found => {
            let reason = match found {
                Some(_) => "Account is disabled",
                None => "This account has no back-office profile",
            };
            if let Err(e) = state.auth.sign_out(&session.access_token).await {
                warn!("could not revoke refused session for {}: {}", session.user.email, e);
            }
            return Err(ApiError::forbidden(reason));
        }
    };

    let app_session = load_session(state.store.as_ref(), &actor).await?;
    set_session_cookies(cookies, state.cookie_policy(), &session, &app_session.profile).map_err(|e| {
        tracing::error!("Failed to encode profile cookie: {}", e);
        ApiError::internal_server_error("Failed to establish session")
    })?;
    Ok(app_session)
}
