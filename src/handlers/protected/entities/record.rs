// handlers/protected/entities/record.rs - record-level entity handlers

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::{json, Map, Value};

use crate::database::Record;
use crate::middleware::{ApiResponse, ApiResult};
use crate::permission::Actor;
use crate::state::AppState;

/// GET /api/entities/:entity/:id
pub async fn record_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Record> {
    Ok(ApiResponse::success(state.entities().get(&actor, &entity, &id).await?))
}

/// PUT /api/entities/:entity/:id - Partial update; only the fields sent are written
pub async fn record_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((entity, id)): Path<(String, String)>,
    Json(changes): Json<Map<String, Value>>,
) -> ApiResult<Record> {
    Ok(ApiResponse::success(state.entities().update(&actor, &entity, &id, changes).await?))
}

/// DELETE /api/entities/:entity/:id
///
/// Deleting a user also removes the login account; if that second step
/// fails the row stays deleted and the response is a 502.
pub async fn record_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    state.entities().delete(&actor, &entity, &id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// PATCH /api/entities/:entity/:id/toggle/:field - Flip one lifecycle flag
pub async fn toggle_patch(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((entity, id, field)): Path<(String, String, String)>,
) -> ApiResult<Record> {
    Ok(ApiResponse::success(state.entities().toggle(&actor, &entity, &id, &field).await?))
}
