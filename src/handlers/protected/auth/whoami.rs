// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler

use axum::extract::State;
use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult};
use crate::permission::Actor;
use crate::services::load_session;
use crate::session::AppSession;
use crate::state::AppState;

/// GET /api/auth/whoami - Current profile, grants and application settings
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "profile": { "id": "...", "email": "...", "full_name": "...", "role": "Admissions",
///                  "grants": [{ "resource": "students", "action": "READ" }] },
///     "settings": { "agency_name": "..." }
///   }
/// }
/// ```
pub async fn whoami_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<AppSession> {
    Ok(ApiResponse::success(load_session(state.store.as_ref(), &actor).await?))
}
