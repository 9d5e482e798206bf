pub mod gotrue;
pub mod memory;
pub mod provider;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

pub use gotrue::GoTrueProvider;
pub use memory::MemoryAuthProvider;
pub use provider::{AuthProvider, AuthSession, AuthUser};

/// Access-token claims as issued by the managed auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Auth account id
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub aud: String,
    #[serde(default)]
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(config: &AuthConfig, sub: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            email: email.into(),
            aud: config.jwt_audience.clone(),
            role: "authenticated".to_string(),
            exp: (now + Duration::seconds(config.token_expiry_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Auth misconfigured: {0}")]
    Misconfigured(String),

    #[error("An account for {0} already exists")]
    UserExists(String),

    #[error("Auth account {0} not found")]
    UserNotFound(String),

    #[error("Auth provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Auth provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },
}

pub fn issue_token(config: &AuthConfig, claims: &Claims) -> Result<String, AuthError> {
    if config.jwt_secret.is_empty() {
        return Err(AuthError::Misconfigured("JWT secret is empty".to_string()));
    }
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Verify an access token locally with the project secret
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    if config.jwt_secret.is_empty() {
        return Err(AuthError::Misconfigured("JWT secret is empty".to_string()));
    }
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(config.jwt_secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
}
