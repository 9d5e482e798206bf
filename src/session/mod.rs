// session - login cookies and the per-request session view
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::auth::AuthSession;
use crate::config::AppConfig;
use crate::permission::ProfileSnapshot;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const PROFILE_COOKIE: &str = "user_profile";

const SESSION_COOKIES: [&str; 3] = [ACCESS_COOKIE, REFRESH_COOKIE, PROFILE_COOKIE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_days: i64,
}

impl CookiePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            secure: config.secure_cookies(),
            max_age_days: config.session.max_age_days,
        }
    }

    fn base(&self, name: &'static str, value: String, http_only: bool) -> tower_cookies::cookie::CookieBuilder<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
    }

    pub fn session_cookie(&self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        self.base(name, value, http_only)
            .max_age(Duration::days(self.max_age_days))
            .build()
    }

    /// Empty value expiring at the Unix epoch
    pub fn expired_cookie(&self, name: &'static str, http_only: bool) -> Cookie<'static> {
        self.base(name, String::new(), http_only)
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

/// Client-readable profile cookie value
pub fn encode_profile(profile: &ProfileSnapshot) -> Result<String, serde_json::Error> {
    Ok(urlencoding::encode(&serde_json::to_string(profile)?).into_owned())
}

pub fn set_session_cookies(
    cookies: &Cookies,
    policy: CookiePolicy,
    session: &AuthSession,
    profile: &ProfileSnapshot,
) -> Result<(), serde_json::Error> {
    let profile = encode_profile(profile)?;
    cookies.add(policy.session_cookie(ACCESS_COOKIE, session.access_token.clone(), true));
    cookies.add(policy.session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), true));
    cookies.add(policy.session_cookie(PROFILE_COOKIE, profile, false));
    Ok(())
}

pub fn clear_session_cookies(cookies: &Cookies, policy: CookiePolicy) {
    for name in SESSION_COOKIES {
        cookies.add(policy.expired_cookie(name, name != PROFILE_COOKIE));
    }
}

pub fn cookie_value(cookies: &Cookies, name: &str) -> Option<String> {
    cookies
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// What `whoami` returns: the profile plus application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSession {
    pub profile: ProfileSnapshot,
    pub settings: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Grant;
    use crate::types::Action;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy { secure, max_age_days: 7 }
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = policy(true).session_cookie(ACCESS_COOKIE, "tok".into(), true);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn expired_cookie_is_empty_at_epoch() {
        let cookie = policy(false).expired_cookie(PROFILE_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.http_only(), Some(false));
    }

    #[test]
    fn profile_cookie_survives_encoding() {
        let profile = ProfileSnapshot {
            id: "u1".into(),
            email: "staff@example.com".into(),
            full_name: "Zoë Staff; Admissions".into(),
            role: Some("Staff".into()),
            grants: vec![Grant::new("students", Action::Read)],
        };
        let raw = encode_profile(&profile).unwrap();
        assert!(!raw.contains(';'));
        assert!(!raw.contains(' '));
        let decoded: ProfileSnapshot = serde_json::from_str(&urlencoding::decode(&raw).unwrap()).unwrap();
        assert_eq!(decoded, profile);
    }
}
