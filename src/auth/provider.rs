use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// Tokens handed out by a password or refresh grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Managed authentication service.
///
/// The GoTrue client talks to the hosted service; the memory provider stands
/// in for it in tests and `serve --memory`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    /// Revoke the refresh tokens behind `access_token`
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Admin: create a confirmed account
    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// Admin: remove an account
    async fn delete_user(&self, auth_id: &str) -> Result<(), AuthError>;
}
