// handlers/protected/files/mod.rs - File retrieval proxies
//
// Both handlers stream a remote body back to the browser as an attachment.

pub mod attachments;
pub mod download;

pub use attachments::attachment_get;
pub use download::download_get;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use std::net::IpAddr;

use axum::response::Response;
use tracing::{error, warn};
use url::Host;

use crate::error::ApiError;

/// Relay a successful upstream response as a download named `filename`
pub(crate) fn stream_attachment(upstream: reqwest::Response, filename: &str) -> Result<Response, ApiError> {
    let status = upstream.status();
    if !status.is_success() {
        error!("file upstream answered {}", status);
        return Err(ApiError::bad_gateway(format!("File source answered {}", status.as_u16())));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(filename))
        .map_err(|_| ApiError::bad_request("Invalid file name"))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::internal_server_error(format!("Failed to build response: {}", e)))
}

/// `attachment; filename="..."` with an RFC 5987 UTF-8 fallback
pub(crate) fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}

/// Loopback, private, link-local, unspecified and broadcast addresses
pub(crate) fn is_internal_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // carrier-grade NAT, 100.64.0.0/10
                || (v4.octets()[0] == 100 && v4.octets()[1] & 0xc0 == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal_address(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7 and link-local fe80::/10
                || first & 0xfe00 == 0xfc00
                || first & 0xffc0 == 0xfe80
        }
    }
}

/// Refuse sources that resolve inside the deployment's own network
pub(crate) async fn ensure_public_host(url: &url::Url) -> Result<(), ApiError> {
    let refused = || ApiError::bad_request("url must point at a public host");
    let port = url.port_or_known_default().unwrap_or(80);
    let addresses: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(refused());
            }
            let resolved: Vec<IpAddr> = tokio::net::lookup_host((domain.as_str(), port))
                .await
                .map_err(|e| {
                    warn!("download host {} did not resolve: {}", domain, e);
                    ApiError::bad_gateway("Could not fetch the file")
                })?
                .map(|addr| addr.ip())
                .collect();
            resolved
        }
        None => return Err(ApiError::bad_request("url must name a host")),
    };
    if addresses.into_iter().any(is_internal_address) {
        return Err(refused());
    }
    Ok(())
}

/// Last path segment of a URL, or `fallback`
pub(crate) fn filename_from_url(url: &url::Url, fallback: &str) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .map(|s| urlencoding::decode(&s).map(|d| d.into_owned()).unwrap_or(s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
