use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::config::BackendConfig;

#[derive(Debug, Error)]
pub enum GraphqlError {
    #[error("invalid GraphQL endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Response(String),

    #[error("response carried no data")]
    MissingData,

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorItem>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorItem {
    message: String,
}

/// Client for the backend's single GraphQL endpoint.
///
/// Every call is one HTTPS POST of `{query, variables}`; the answer carries
/// either `data` or `errors`. No retries.
#[derive(Clone, Debug)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    bearer: String,
}

impl GraphqlClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        api_key: impl Into<String>,
        bearer: impl Into<String>,
    ) -> Result<Self, GraphqlError> {
        let endpoint = Url::parse(endpoint).map_err(|e| GraphqlError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            bearer: bearer.into(),
        })
    }

    /// Client authenticated with the service-role key
    pub fn from_config(config: &BackendConfig, http: reqwest::Client) -> Result<Self, GraphqlError> {
        let bearer = if config.service_role_key.is_empty() {
            config.anon_key.clone()
        } else {
            config.service_role_key.clone()
        };
        Self::new(http, &config.graphql_url, config.anon_key.clone(), bearer)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// HTTP client tuned for backend calls
    pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, GraphqlError> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?)
    }

    /// Execute a document and return its `data` object
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, GraphqlError> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(GraphqlError::Status { status: status.as_u16(), body });
        }

        let parsed: GraphqlResponse = serde_json::from_str(&body)?;
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(GraphqlError::Response(messages.join("; ")));
        }

        match parsed.data {
            Some(Value::Null) | None => Err(GraphqlError::MissingData),
            Some(data) => Ok(data),
        }
    }
}
