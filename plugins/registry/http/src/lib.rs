//! Client for a Confluent-compatible schema registry.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use tailcat_api::{SchemaFetcher, TailError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ═══════════════════════════════════════════════════════════════
//  RegistryConfig
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Base URL, e.g. `https://registry.example.com:8081`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accept invalid TLS certificates.
    pub insecure: bool,
}

impl RegistryConfig {
    fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        (!username.is_empty() || !password.is_empty()).then_some((username, password))
    }
}

/// Body of `GET /schemas/ids/{id}`.
#[derive(serde::Deserialize)]
struct SchemaResponse {
    schema: String,
}

// ═══════════════════════════════════════════════════════════════
//  RegistryClient
// ═══════════════════════════════════════════════════════════════

pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, TailError> {
        if config.insecure {
            tracing::warn!(url = %config.url, "schema registry certificate verification disabled");
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| TailError::config(format!("schema registry client: {e}")))?;
        Ok(Self { http, config })
    }

    fn schema_url(&self, id: u32) -> String {
        format!("{}/schemas/ids/{id}", self.config.url.trim_end_matches('/'))
    }

    async fn get_schema(&self, id: u32) -> Result<String, TailError> {
        let url = self.schema_url(id);
        tracing::debug!(%url, "fetching schema");

        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some((username, password)) = self.config.credentials() {
            request = request.basic_auth(username, Some(password));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| TailError::registry(format!("schema registry request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TailError::registry(format!("read schema registry response: {e}")))?;

        if status != StatusCode::OK {
            return Err(TailError::registry(format!(
                "schema registry returned status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: SchemaResponse = serde_json::from_str(&body)
            .map_err(|e| TailError::registry(format!("parse schema registry response: {e}")))?;
        Ok(parsed.schema)
    }
}

impl SchemaFetcher for RegistryClient {
    fn fetch_schema(&self, id: u32) -> Pin<Box<dyn Future<Output = Result<String, TailError>> + Send + '_>> {
        Box::pin(self.get_schema(id))
    }
}
