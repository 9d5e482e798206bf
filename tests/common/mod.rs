#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Response, StatusCode};
use serde_json::{json, Map, Value};

use agency_office::config::AppConfig;
use agency_office::handlers::router;
use agency_office::services::{bootstrap_admin, system_actor, AdminBootstrap};
use agency_office::state::AppState;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "administrator";

/// One in-process server per test: memory store, memory auth, seeded admin
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// Tokens lifted from the login response's Set-Cookie headers
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::development()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        let state = AppState::in_memory(config)?;
        bootstrap_admin(
            state.store.as_ref(),
            state.auth.as_ref(),
            &AdminBootstrap {
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
                full_name: "Admin".into(),
            },
        )
        .await?;

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login_response(&self, email: &str, password: &str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let res = self.login_response(email, password).await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        Ok(Session {
            access_token: cookie(&res, "access_token").context("no access_token cookie")?,
            refresh_token: cookie(&res, "refresh_token").context("no refresh_token cookie")?,
        })
    }

    pub async fn login_admin(&self) -> Result<Session> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Request carrying the session the way a browser does, as a cookie
    pub fn request(&self, method: reqwest::Method, path: &str, session: &Session) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(COOKIE, format!("access_token={}", session.access_token))
    }

    pub fn bearer(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", token))
    }

    /// Create a role holding exactly `grants` plus an active user in it
    pub async fn staff_user(&self, email: &str, grants: &[(&str, &str)]) -> Result<String> {
        let service = self.state.entities();
        let actor = system_actor();
        let role = service
            .create(&actor, "roles", object(json!({ "name": format!("Role for {}", email) })))
            .await?;
        for (resource, action) in grants {
            service
                .create(
                    &actor,
                    "role_access",
                    object(json!({ "role_id": role.id, "resource": resource, "action": action })),
                )
                .await?;
        }
        let user = service
            .create(
                &actor,
                "users",
                object(json!({
                    "full_name": "Staff Member",
                    "email": email,
                    "role_id": role.id,
                    "password": "staff-password",
                    "confirm_password": "staff-password"
                })),
            )
            .await?;
        Ok(user.id)
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// All Set-Cookie headers of a response
pub fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Value of the named cookie set by a response
pub fn cookie(res: &Response, name: &str) -> Option<String> {
    set_cookies(res).into_iter().find_map(|header| {
        let pair = header.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}
