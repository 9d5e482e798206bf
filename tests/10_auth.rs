mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use agency_office::auth::{issue_token, Claims};
use agency_office::services::system_actor;
use common::{cookie, set_cookies, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.client.get(app.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test]
async fn login_sets_session_cookies_and_returns_profile() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.login_response(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let headers = set_cookies(&res);
    let access = headers.iter().find(|h| h.starts_with("access_token=")).expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Strict"));
    assert!(access.contains("Path=/"));
    let profile = headers.iter().find(|h| h.starts_with("user_profile=")).expect("profile cookie");
    assert!(!profile.contains("HttpOnly"));
    assert!(cookie(&res, "refresh_token").is_some());

    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["profile"]["email"], json!(ADMIN_EMAIL));
    assert_eq!(body["data"]["profile"]["role"], json!("Administrator"));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.login_response(ADMIN_EMAIL, "not-the-password").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(cookie(&res, "access_token").is_none());
    Ok(())
}

#[tokio::test]
async fn blank_login_fields_are_validation_errors() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.login_response("", "").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["password"].is_string());
    Ok(())
}

#[tokio::test]
async fn inactive_user_is_refused_without_cookies() -> Result<()> {
    let app = TestApp::spawn().await?;
    let user_id = app.staff_user("staff@example.com", &[("countries", "READ")]).await?;
    app.state
        .entities()
        .toggle(&system_actor(), "users", &user_id, "is_active")
        .await?;

    let res = app.login_response("staff@example.com", "staff-password").await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(set_cookies(&res).is_empty());
    Ok(())
}

#[tokio::test]
async fn whoami_accepts_cookie_or_bearer() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.login_admin().await?;

    let res = app.request(Method::GET, "/api/auth/whoami", &session).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["profile"]["email"], json!(ADMIN_EMAIL));

    let res = app.bearer(Method::GET, "/api/auth/whoami", &session.access_token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn missing_session_is_unauthorized() -> Result<()> {
    let app = TestApp::spawn().await?;
    let res = app.client.get(app.url("/api/entities")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], json!("UNAUTHORIZED"));
    Ok(())
}

#[tokio::test]
async fn expired_token_tears_down_the_session() -> Result<()> {
    let app = TestApp::spawn().await?;
    let mut claims = Claims::new(&app.state.config.auth, "someone", ADMIN_EMAIL);
    claims.exp = claims.iat - 60;
    let expired = issue_token(&app.state.config.auth, &claims)?;

    let res = app.bearer(Method::GET, "/api/auth/whoami", &expired).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cookie(&res, "access_token").as_deref(), Some(""));
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], json!("SESSION_EXPIRED"));
    Ok(())
}

#[tokio::test]
async fn refresh_issues_a_new_session_once() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.login_admin().await?;

    let res = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(cookie(&res, "access_token").is_some_and(|t| !t.is_empty()));

    // Refresh tokens rotate
    let res = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], json!("SESSION_EXPIRED"));
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookies() -> Result<()> {
    let app = TestApp::spawn().await?;
    let session = app.login_admin().await?;

    let res = app.request(Method::POST, "/auth/logout", &session).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    for name in ["access_token", "refresh_token", "user_profile"] {
        assert_eq!(cookie(&res, name).as_deref(), Some(""), "{} not cleared", name);
    }
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["signed_out"], json!(true));
    Ok(())
}
