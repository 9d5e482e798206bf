use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::provider::{AuthProvider, AuthSession, AuthUser};
use crate::auth::AuthError;
use crate::config::BackendConfig;

/// Client for a GoTrue-style auth REST API
#[derive(Clone, Debug)]
pub struct GoTrueProvider {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl GoTrueProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
        }
    }

    pub fn from_config(config: &BackendConfig, http: reqwest::Client) -> Result<Self, AuthError> {
        url::Url::parse(&config.auth_url)
            .map_err(|e| AuthError::Misconfigured(format!("auth url {}: {}", config.auth_url, e)))?;
        Ok(Self::new(
            http,
            config.auth_url.clone(),
            config.anon_key.clone(),
            config.service_role_key.clone(),
        ))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin_key(&self) -> Result<&str, AuthError> {
        if self.service_role_key.is_empty() {
            Err(AuthError::Misconfigured("service role key is required for admin calls".to_string()))
        } else {
            Ok(&self.service_role_key)
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<AuthSession, AuthError> {
        debug!("auth: {} grant", grant_type);
        let res = self
            .http
            .post(self.url("/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        match res.status() {
            // GoTrue answers bad credentials and dead refresh tokens with 400
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials),
            _ => read_json(res).await,
        }
    }
}

async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, AuthError> {
    let status = res.status();
    if !status.is_success() {
        return Err(provider_error(status, res).await);
    }
    res.json::<T>().await.map_err(AuthError::from)
}

async fn provider_error(status: StatusCode, res: reqwest::Response) -> AuthError {
    let body: Value = res.json().await.unwrap_or(Value::Null);
    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string();
    AuthError::Provider { status: status.as_u16(), message }
}

#[async_trait]
impl AuthProvider for GoTrueProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let res = self
            .http
            .post(self.url("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = res.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(provider_error(status, res).await)
        }
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let key = self.admin_key()?;
        let res = self
            .http
            .post(self.url("/admin/users"))
            .header("apikey", key)
            .bearer_auth(key)
            .json(&json!({ "email": email, "password": password, "email_confirm": true }))
            .send()
            .await?;
        match res.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(AuthError::UserExists(email.to_string())),
            _ => read_json(res).await,
        }
    }

    async fn delete_user(&self, auth_id: &str) -> Result<(), AuthError> {
        let key = self.admin_key()?;
        let res = self
            .http
            .delete(self.url(&format!("/admin/users/{}", urlencoding::encode(auth_id))))
            .header("apikey", key)
            .bearer_auth(key)
            .send()
            .await?;
        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(AuthError::UserNotFound(auth_id.to_string())),
            s => Err(provider_error(s, res).await),
        }
    }
}
