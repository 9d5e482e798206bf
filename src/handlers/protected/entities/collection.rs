// handlers/protected/entities/collection.rs - collection-level entity handlers

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::Record;
use crate::entity::EntityDef;
use crate::filter::PageRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::permission::Actor;
use crate::services::OptionItem;
use crate::state::AppState;
use crate::types::Action;

#[derive(Debug, Serialize)]
pub struct CatalogueEntry {
    #[serde(flatten)]
    pub entity: &'static EntityDef,
    pub actions: Vec<Action>,
}

/// GET /api/entities - Entities the actor may read, with their allowed actions
pub async fn catalogue_get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<Vec<CatalogueEntry>> {
    let entries = state
        .entities()
        .catalogue(&actor)
        .into_iter()
        .map(|entity| CatalogueEntry {
            entity,
            actions: Action::ALL.into_iter().filter(|a| actor.can(entity.resource(), *a)).collect(),
        })
        .collect();
    Ok(ApiResponse::success(entries))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListPage {
    pub records: Vec<Record>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

/**
 * GET /api/entities/:entity - One page of records
 *
 * Query: `page` (0-based, default 0), `page_size` (default from config),
 * `search` (case-insensitive substring on the entity's search column),
 * `sort` (`"column [asc|desc], ..."`, default `created_at desc`),
 * `filter` (`"column:op:value;..."`, ops eq neq gt gte lt lte like ilike in is).
 * A negative page, non-positive page size or bad filter clause is a 400.
 */
pub async fn collection_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<ListPage> {
    let page_size = query.page_size.unwrap_or(state.config.list.default_page_size);
    let mut request = PageRequest::new(query.page.unwrap_or(0), page_size);
    if let Some(search) = query.search {
        request = request.with_search(search);
    }
    if let Some(sort) = query.sort {
        request = request.with_sort(sort);
    }
    if let Some(filter) = query.filter {
        request = request.with_filter(filter);
    }

    let page = state.entities().list(&actor, &entity, &request).await?;
    Ok(ApiResponse::success(ListPage {
        records: page.records,
        total_count: page.total_count,
        page: request.page,
        page_size: request.page_size.min(state.config.list.max_page_size),
    }))
}

/// POST /api/entities/:entity - Create a record from a JSON object of field values
pub async fn collection_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(entity): Path<String>,
    Json(values): Json<Map<String, Value>>,
) -> ApiResult<Record> {
    let record = state.entities().create(&actor, &entity, values).await?;
    Ok(ApiResponse::created(record))
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    pub flag: Option<String>,
}

/// GET /api/entities/:entity/options[?flag=] - Active rows as `{id, name}` for dropdowns
pub async fn options_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(entity): Path<String>,
    Query(query): Query<OptionsQuery>,
) -> ApiResult<Vec<OptionItem>> {
    let options = state.entities().options(&actor, &entity, query.flag.as_deref()).await?;
    Ok(ApiResponse::success(options))
}
