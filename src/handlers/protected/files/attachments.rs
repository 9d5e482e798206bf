// handlers/protected/files/attachments.rs - GET /api/attachments handler

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::entity::registry::{ATTACHMENTS, ATTACHMENT_CATEGORIES};
use crate::entity::ValidationErrors;
use crate::error::ApiError;
use crate::filter::FilterWhere;
use crate::permission::Actor;
use crate::state::AppState;
use crate::types::Action;

use super::stream_attachment;

#[derive(Debug, Deserialize)]
pub struct AttachmentQuery {
    pub record_id: String,
    #[serde(rename = "type")]
    pub category: String,
}

/**
 * GET /api/attachments?record_id=&type= - Attachment of one category for a record
 *
 * Looks up the attachment row by `record_id` and `category`, POSTs
 * `{id, record_id, category}` to the configured attachment webhook and
 * streams the returned binary back as a download.
 */
pub async fn attachment_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AttachmentQuery>,
) -> Result<Response, ApiError> {
    if !actor.can(ATTACHMENTS.resource(), Action::Read) {
        return Err(ApiError::forbidden("Not allowed to READ attachments"));
    }
    if !ATTACHMENT_CATEGORIES.contains(&query.category.as_str()) {
        return Err(ValidationErrors::single(
            "type",
            format!("Must be one of: {}", ATTACHMENT_CATEGORIES.join(", ")),
        )
        .into());
    }

    let condition = FilterWhere::eq("record_id", query.record_id.as_str()).and(FilterWhere::eq("category", query.category.as_str()));
    let attachment = state
        .store
        .find_one(&ATTACHMENTS, condition)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No {} attachment for record {}", query.category, query.record_id)))?;

    let webhook = state
        .config
        .webhooks
        .attachment_url
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Attachment webhook is not configured"))?;

    debug!("requesting attachment {} from webhook", attachment.id);
    let upstream = state
        .http
        .post(webhook)
        .json(&json!({
            "id": attachment.id,
            "record_id": query.record_id,
            "category": query.category
        }))
        .send()
        .await
        .map_err(|e| {
            error!("attachment webhook failed: {}", e);
            ApiError::bad_gateway("Could not fetch the attachment")
        })?;

    let filename = attachment
        .str_field("name")
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", query.category, query.record_id));
    stream_attachment(upstream, &filename)
}
