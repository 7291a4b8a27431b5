// ABOUTME: Simulated remote provider answering from a canned catalog
// ABOUTME: Supports per-capability overrides and injected failures for demos and tests

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::catalog::{catalog_for, Catalog};
use super::{not_found_result, AbilityProvider, ProviderError, Result};
use crate::template::TemplateEngine;
use crate::JsonMap;

/// Network delay the canned servers pretend to have
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

pub struct SimulatedProvider {
    provider_id: String,
    catalog: Catalog,
    failures: HashMap<String, String>,
    latency: Duration,
    templates: TemplateEngine,
}

impl SimulatedProvider {
    /// Provider with the well-known catalog for `provider_id`, or an empty one
    pub fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            catalog: catalog_for(provider_id).unwrap_or_default(),
            failures: HashMap::new(),
            latency: Duration::ZERO,
            templates: TemplateEngine::new(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replace or add the canned response for one capability
    pub fn with_response(mut self, capability: &str, response: JsonValue) -> Self {
        self.catalog.insert(capability.to_string(), response);
        self
    }

    /// Make every call to `capability` fail with `message`
    pub fn with_failure(mut self, capability: &str, message: &str) -> Self {
        self.failures
            .insert(capability.to_string(), message.to_string());
        self
    }

    pub fn capabilities(&self) -> Vec<&str> {
        self.catalog.keys().map(|k| k.as_str()).collect()
    }
}

#[async_trait]
impl AbilityProvider for SimulatedProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn execute(&self, capability: &str, payload: &JsonMap) -> Result<JsonMap> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = self.failures.get(capability) {
            return Err(ProviderError::Failed {
                capability: capability.to_string(),
                message: message.clone(),
            });
        }

        match self.catalog.get(capability) {
            Some(document) => {
                debug!("{} answering '{}' from catalog", self.provider_id, capability);
                Ok(self.templates.resolve_object(document, payload)?)
            }
            None => Ok(not_found_result()),
        }
    }
}
