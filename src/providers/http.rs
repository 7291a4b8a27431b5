// ABOUTME: HTTP ability provider posting capability requests to a remote server
// ABOUTME: Shares one reqwest client so concurrent runs reuse the connection pool

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{AbilityProvider, ProviderError, Result};
use crate::JsonMap;

#[derive(Debug, Serialize)]
struct AbilityRequest<'a> {
    ability: &'a str,
    payload: &'a JsonMap,
    timestamp: String,
}

pub struct HttpProvider {
    provider_id: String,
    url: String,
    api_key: Option<String>,
    client: Client,
    closed: AtomicBool,
}

impl HttpProvider {
    pub fn new(provider_id: &str, url: &str, client: Client) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            url: url.trim_end_matches('/').to_string(),
            api_key: None,
            client,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AbilityProvider for HttpProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn execute(&self, capability: &str, payload: &JsonMap) -> Result<JsonMap> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Closed {
                provider_id: self.provider_id.clone(),
            });
        }

        let request = AbilityRequest {
            ability: capability,
            payload,
            timestamp: Utc::now().to_rfc3339(),
        };

        info!("Executing ability '{}' on {} server", capability, self.provider_id);

        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider_id: self.provider_id.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body: JsonValue =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    capability: capability.to_string(),
                    reason: e.to_string(),
                })?;

        match body {
            JsonValue::Object(result) => Ok(result),
            other => Err(ProviderError::MalformedResponse {
                capability: capability.to_string(),
                reason: format!("expected a JSON object, got {}", other),
            }),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Closed HTTP provider {}", self.provider_id);
        Ok(())
    }
}
