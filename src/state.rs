use std::sync::Arc;

use crate::auth::{AuthProvider, GoTrueProvider, MemoryAuthProvider};
use crate::config::AppConfig;
use crate::database::{EntityStore, GraphqlStore, MemoryStore};
use crate::graphql::{GraphqlClient, GraphqlError};
use crate::services::EntityService;
use crate::session::CookiePolicy;

/// Everything a request handler needs, passed explicitly to the router
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn EntityStore>,
    pub auth: Arc<dyn AuthProvider>,
    /// Shared client for outbound proxy and webhook calls
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn EntityStore>, auth: Arc<dyn AuthProvider>, http: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            store,
            auth,
            http,
        }
    }

    /// Hosted backend: GraphQL store plus GoTrue auth
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let http = GraphqlClient::http_client(config.backend.request_timeout_secs)?;
        let client = GraphqlClient::from_config(&config.backend, http.clone())?;
        let auth = GoTrueProvider::from_config(&config.backend, http.clone())?;
        Ok(Self::new(config, Arc::new(GraphqlStore::new(client)), Arc::new(auth), http))
    }

    /// Self-contained state for `serve --memory` and tests
    pub fn in_memory(config: AppConfig) -> Result<Self, GraphqlError> {
        let http = GraphqlClient::http_client(config.backend.request_timeout_secs)?;
        let auth = MemoryAuthProvider::new(config.auth.clone());
        Ok(Self::new(config, Arc::new(MemoryStore::new()), Arc::new(auth), http))
    }

    pub fn entities(&self) -> EntityService {
        EntityService::new(self.store.clone(), self.auth.clone(), &self.config)
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy::from_config(&self.config)
    }
}
