use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub list: ListConfig,
    pub webhooks: WebhookConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Hosted database reached through its generated GraphQL layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub graphql_url: String,
    pub auth_url: String,
    pub anon_key: String,
    #[serde(skip_serializing)]
    pub service_role_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub token_expiry_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub secure_cookies: bool,
    pub max_age_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub search_debounce_ms: u64,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    /// Let `/api/download` fetch from loopback, private and link-local hosts
    #[serde(default)]
    pub allow_private_downloads: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Cookies get the `Secure` attribute in production or when forced
    pub fn secure_cookies(&self) -> bool {
        self.is_production() || self.session.secure_cookies
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides
        if let Ok(v) = env::var("BACKEND_GRAPHQL_URL") {
            self.backend.graphql_url = v;
        }
        if let Ok(v) = env::var("BACKEND_AUTH_URL") {
            self.backend.auth_url = v;
        }
        if let Ok(v) = env::var("BACKEND_ANON_KEY") {
            self.backend.anon_key = v;
        }
        if let Ok(v) = env::var("BACKEND_SERVICE_ROLE_KEY") {
            self.backend.service_role_key = v;
        }
        if let Ok(v) = env::var("BACKEND_REQUEST_TIMEOUT_SECS") {
            self.backend.request_timeout_secs = v.parse().unwrap_or(self.backend.request_timeout_secs);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var("AUTH_JWT_AUDIENCE") {
            self.auth.jwt_audience = v;
        }
        if let Ok(v) = env::var("AUTH_TOKEN_EXPIRY_SECS") {
            self.auth.token_expiry_secs = v.parse().unwrap_or(self.auth.token_expiry_secs);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_SECURE_COOKIES") {
            self.session.secure_cookies = v.parse().unwrap_or(self.session.secure_cookies);
        }
        if let Ok(v) = env::var("SESSION_MAX_AGE_DAYS") {
            self.session.max_age_days = v.parse().unwrap_or(self.session.max_age_days);
        }

        // List overrides
        if let Ok(v) = env::var("LIST_DEFAULT_PAGE_SIZE") {
            self.list.default_page_size = v.parse().unwrap_or(self.list.default_page_size);
        }
        if let Ok(v) = env::var("LIST_MAX_PAGE_SIZE") {
            self.list.max_page_size = v.parse().unwrap_or(self.list.max_page_size);
        }
        if let Ok(v) = env::var("LIST_SEARCH_DEBOUNCE_MS") {
            self.list.search_debounce_ms = v.parse().unwrap_or(self.list.search_debounce_ms);
        }
        if let Ok(v) = env::var("LIST_DEBUG_LOGGING") {
            self.list.debug_logging = v.parse().unwrap_or(self.list.debug_logging);
        }

        // Webhook overrides
        if let Ok(v) = env::var("WEBHOOK_ATTACHMENT_URL") {
            self.webhooks.attachment_url = Some(v).filter(|s| !s.trim().is_empty());
        }

        // API overrides
        if let Ok(v) = env::var("AGENCY_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_PRIVATE_DOWNLOADS") {
            self.security.allow_private_downloads = v.parse().unwrap_or(self.security.allow_private_downloads);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                graphql_url: "http://localhost:54321/graphql/v1".to_string(),
                auth_url: "http://localhost:54321/auth/v1".to_string(),
                anon_key: String::new(),
                service_role_key: String::new(),
                request_timeout_secs: 30,
            },
            auth: AuthConfig {
                jwt_secret: "development-jwt-secret-change-me".to_string(),
                jwt_audience: "authenticated".to_string(),
                token_expiry_secs: 60 * 60,
            },
            session: SessionConfig {
                secure_cookies: false,
                max_age_days: 7,
            },
            list: ListConfig {
                default_page_size: 10,
                max_page_size: 1000,
                search_debounce_ms: 500,
                debug_logging: true,
            },
            webhooks: WebhookConfig { attachment_url: None },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: false,
                allow_private_downloads: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                graphql_url: String::new(),
                auth_url: String::new(),
                anon_key: String::new(),
                service_role_key: String::new(),
                request_timeout_secs: 15,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                jwt_audience: "authenticated".to_string(),
                token_expiry_secs: 60 * 60,
            },
            session: SessionConfig {
                secure_cookies: true,
                max_age_days: 7,
            },
            list: ListConfig {
                default_page_size: 10,
                max_page_size: 500,
                search_debounce_ms: 500,
                debug_logging: false,
            },
            webhooks: WebhookConfig { attachment_url: None },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                enable_audit_logging: true,
                allow_private_downloads: false,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                graphql_url: String::new(),
                auth_url: String::new(),
                anon_key: String::new(),
                service_role_key: String::new(),
                request_timeout_secs: 10,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                jwt_audience: "authenticated".to_string(),
                token_expiry_secs: 60 * 60,
            },
            session: SessionConfig {
                secure_cookies: true,
                max_age_days: 7,
            },
            list: ListConfig {
                default_page_size: 10,
                max_page_size: 100,
                search_debounce_ms: 500,
                debug_logging: false,
            },
            webhooks: WebhookConfig { attachment_url: None },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                enable_audit_logging: true,
                allow_private_downloads: false,
            },
        }
    }
}

// Global singleton config - read by the binaries at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.list.search_debounce_ms, 500);
        assert_eq!(config.session.max_age_days, 7);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.list.max_page_size, 100);
        assert!(config.secure_cookies());
        assert!(config.auth.jwt_secret.is_empty());
    }
}
