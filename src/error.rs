// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::auth::AuthError;
use crate::database::{RecordError, StoreError};
use crate::entity::ValidationErrors;
use crate::filter::FilterError;
use crate::graphql::GraphqlError;
use crate::services::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),
    SessionExpired(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (backend, auth provider or webhook failures)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::SessionExpired(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::SessionExpired(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::SessionExpired(_) => "SESSION_EXPIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });
        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            body["field_errors"] = json!(field_errors);
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<BTreeMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        ApiError::SessionExpired(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::validation_error("Validation failed", Some(err.0))
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::SystemFieldNotAllowed(field) => {
                let mut field_errors = BTreeMap::new();
                field_errors.insert(field.clone(), "This field is assigned by the system".to_string());
                ApiError::validation_error(format!("System field '{}' cannot be set via API", field), Some(field_errors))
            }
        }
    }
}

impl From<GraphqlError> for ApiError {
    fn from(err: GraphqlError) -> Self {
        match err {
            GraphqlError::Transport(e) if e.is_timeout() || e.is_connect() => {
                tracing::error!("Backend unreachable: {}", e);
                ApiError::service_unavailable("Backend temporarily unavailable")
            }
            GraphqlError::InvalidEndpoint(msg) => {
                tracing::error!("Backend misconfigured: {}", msg);
                ApiError::internal_server_error("Backend is not configured")
            }
            other => {
                // Don't expose backend internals to clients
                tracing::error!("Backend error: {}", other);
                ApiError::bad_gateway("The backend could not process the request")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ApiError::not_found(format!("{} record {} not found", entity, id)),
            StoreError::Filter(e) => e.into(),
            StoreError::Record(e) => e.into(),
            StoreError::Graphql(e) => e.into(),
            StoreError::Payload(msg) => {
                tracing::error!("Unexpected backend payload: {}", msg);
                ApiError::bad_gateway("Unexpected response from the backend")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AuthError::Expired => ApiError::session_expired("Session expired, please sign in again"),
            AuthError::InvalidToken(_) => ApiError::session_expired("Invalid session, please sign in again"),
            AuthError::UserExists(_) => ApiError::conflict(err.to_string()),
            AuthError::UserNotFound(_) => ApiError::not_found(err.to_string()),
            AuthError::Misconfigured(msg) => {
                tracing::error!("Auth misconfigured: {}", msg);
                ApiError::internal_server_error("Authentication is not configured")
            }
            AuthError::Transport(e) => {
                tracing::error!("Auth provider unreachable: {}", e);
                ApiError::service_unavailable("Authentication service unavailable")
            }
            AuthError::Provider { status, message } => {
                tracing::error!("Auth provider returned {}: {}", status, message);
                ApiError::bad_gateway("Authentication service error")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownEntity(_) => ApiError::not_found(err.to_string()),
            ServiceError::Forbidden { .. } => ApiError::forbidden(err.to_string()),
            ServiceError::Validation(errors) => errors.into(),
            ServiceError::NotToggle { .. } => ApiError::bad_request(err.to_string()),
            ServiceError::AlreadyExists(_) => ApiError::conflict(err.to_string()),
            ServiceError::Filter(e) => e.into(),
            ServiceError::Store(e) => e.into(),
            ServiceError::Auth(e) => e.into(),
            ServiceError::PartialFailure(msg) => ApiError::bad_gateway(msg),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    #[test]
    fn validation_body_carries_field_errors() {
        let err: ApiError = ValidationErrors::single("name", "This field is required").into();
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["field_errors"]["name"], json!("This field is required"));
    }

    #[test]
    fn service_errors_map_to_statuses() {
        let forbidden: ApiError = ServiceError::Forbidden { resource: "students".into(), action: Action::Delete }.into();
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(forbidden.error_code(), "FORBIDDEN");

        let partial: ApiError = ServiceError::PartialFailure("half done".into()).into();
        assert_eq!(partial.status_code(), 502);

        let missing: ApiError = ServiceError::Store(StoreError::NotFound { entity: "countries".into(), id: "x".into() }).into();
        assert_eq!(missing.status_code(), 404);

        let paging: ApiError = ServiceError::Filter(FilterError::InvalidPage(-1)).into();
        assert_eq!(paging.status_code(), 400);
    }

    #[test]
    fn expired_token_is_session_expired() {
        let err: ApiError = AuthError::Expired.into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_json()["code"], json!("SESSION_EXPIRED"));
        assert!(err.to_json().get("field_errors").is_none());
    }
}
