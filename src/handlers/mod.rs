// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (session cookie or bearer token)

pub mod protected;
pub mod public;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::{extract::State, middleware, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::SecurityConfig;
use crate::middleware::require_session;
use crate::state::AppState;

/// Full application router with layers applied
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(api_routes(state.clone()))
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CookieManagerLayer::new()),
        )
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
        .route("/auth/logout", post(auth::logout_post))
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, entities, files};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        // Registry and collections
        .route("/api/entities", get(entities::catalogue_get))
        .route("/api/entities/:entity", get(entities::collection_get).post(entities::collection_post))
        .route("/api/entities/:entity/options", get(entities::options_get))
        // Records
        .route(
            "/api/entities/:entity/:id",
            get(entities::record_get).put(entities::record_put).delete(entities::record_delete),
        )
        .route("/api/entities/:entity/:id/toggle/:field", patch(entities::toggle_patch))
        // Files
        .route("/api/download", get(files::download_get))
        .route("/api/attachments", get(files::attachment_get))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

/// Credentialed CORS for the configured front-end origins
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Agency Office API",
            "version": version,
            "description": "Back-office API for student recruitment and admissions",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/login, /auth/refresh, /auth/logout (public - session cookies)",
                "auth": "/api/auth/whoami (protected)",
                "entities": "/api/entities[/:entity[/:id]] (protected)",
                "options": "/api/entities/:entity/options (protected)",
                "toggle": "/api/entities/:entity/:id/toggle/:field (protected)",
                "files": "/api/download, /api/attachments (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "backend": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "backend unavailable",
                "code": "SERVICE_UNAVAILABLE",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "backend_error": e.to_string()
                }
            })),
        ),
    }
}
