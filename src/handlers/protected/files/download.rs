// handlers/protected/files/download.rs - GET /api/download handler

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use tracing::{debug, error};

use crate::entity::registry::ATTACHMENTS;
use crate::error::ApiError;
use crate::permission::Actor;
use crate::state::AppState;
use crate::types::Action;

use super::{ensure_public_host, filename_from_url, stream_attachment};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: String,
    pub filename: Option<String>,
}

/// GET /api/download?url=&filename= - Fetch a stored file and hand it back as an attachment
///
/// Needs READ on attachments. Only http(s) sources on public hosts are accepted
/// unless `security.allow_private_downloads` is set. The remote body is
/// streamed, not buffered.
pub async fn download_get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    if !actor.can(ATTACHMENTS.resource(), Action::Read) {
        return Err(ApiError::forbidden("Not allowed to READ attachments"));
    }
    let url = url::Url::parse(&query.url).map_err(|_| ApiError::bad_request("url must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::bad_request("url must use http or https"));
    }
    if !state.config.security.allow_private_downloads {
        ensure_public_host(&url).await?;
    }
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| filename_from_url(&url, "download"));

    debug!("proxying download {}", url);
    let upstream = state.http.get(url).send().await.map_err(|e| {
        error!("download fetch failed: {}", e);
        ApiError::bad_gateway("Could not fetch the file")
    })?;
    stream_attachment(upstream, &filename)
}
