// ABOUTME: Ability providers and the per-run provider registry
// ABOUTME: The registry routes (provider, capability) calls and turns every failure into an error record

pub mod catalog;
pub mod error;
pub mod http;
pub mod internal;
pub mod simulated;

pub use error::{ProviderError, Result};
pub use http::HttpProvider;
pub use internal::InternalProvider;
pub use simulated::SimulatedProvider;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::AbilityExecution;
use crate::JsonMap;

pub const INTERNAL_PROVIDER: &str = "internal";

/// Default bound on a single ability call
pub const DEFAULT_ABILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Result handed back for capabilities a provider does not know
pub fn not_found_result() -> JsonMap {
    let mut result = JsonMap::new();
    result.insert("status".to_string(), "ability_not_found".into());
    result.insert("result".to_string(), serde_json::Value::Null);
    result
}

pub fn is_not_found(result: &JsonMap) -> bool {
    result.get("status").and_then(|s| s.as_str()) == Some("ability_not_found")
}

#[async_trait]
pub trait AbilityProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Run one capability against the payload snapshot
    async fn execute(&self, capability: &str, payload: &JsonMap) -> Result<JsonMap>;

    /// Release provider resources; the registry calls this at most once
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct RegisteredProvider {
    provider: Arc<dyn AbilityProvider>,
    timeout: Duration,
}

pub struct ProviderRegistry {
    providers: HashMap<String, RegisteredProvider>,
    default_timeout: Duration,
    closed: AtomicBool,
}

impl ProviderRegistry {
    /// Registry holding only the built-in internal provider
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.providers.insert(
            INTERNAL_PROVIDER.to_string(),
            RegisteredProvider {
                provider: Arc::new(InternalProvider::new()),
                timeout: DEFAULT_ABILITY_TIMEOUT,
            },
        );
        registry
    }

    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            default_timeout: DEFAULT_ABILITY_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a provider under its own id with the default timeout
    pub fn register(&mut self, provider: Arc<dyn AbilityProvider>) -> Result<()> {
        let timeout = self.default_timeout;
        self.register_with_timeout(provider, timeout)
    }

    pub fn register_with_timeout(
        &mut self,
        provider: Arc<dyn AbilityProvider>,
        timeout: Duration,
    ) -> Result<()> {
        let provider_id = provider.provider_id().to_string();
        if self.providers.contains_key(&provider_id) {
            return Err(ProviderError::DuplicateProvider { provider_id });
        }
        self.providers
            .insert(provider_id, RegisteredProvider { provider, timeout });
        Ok(())
    }

    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Execute one ability; never fails, errors come back as an ERROR execution
    pub async fn execute(
        &self,
        provider_id: &str,
        capability: &str,
        payload: &JsonMap,
    ) -> AbilityExecution {
        let issued_at = Utc::now();

        match self.try_execute(provider_id, capability, payload).await {
            Ok(result) => {
                debug!("Executed ability '{}' on {}", capability, provider_id);
                AbilityExecution::success(capability, provider_id, issued_at, result)
            }
            Err(e) => {
                warn!(
                    "Ability '{}' on {} failed: {}",
                    capability, provider_id, e
                );
                AbilityExecution::failure(capability, provider_id, issued_at, e.to_string())
            }
        }
    }

    async fn try_execute(
        &self,
        provider_id: &str,
        capability: &str,
        payload: &JsonMap,
    ) -> Result<JsonMap> {
        if self.is_closed() {
            return Err(ProviderError::Closed {
                provider_id: provider_id.to_string(),
            });
        }

        let entry = self
            .providers
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider {
                provider_id: provider_id.to_string(),
            })?;

        let call = AssertUnwindSafe(entry.provider.execute(capability, payload)).catch_unwind();
        match timeout(entry.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ProviderError::Panicked {
                provider_id: provider_id.to_string(),
                capability: capability.to_string(),
                message: panic_message(panic.as_ref()),
            }),
            Err(_) => Err(ProviderError::Timeout {
                provider_id: provider_id.to_string(),
                capability: capability.to_string(),
                timeout: entry.timeout,
            }),
        }
    }

    /// Tear down every provider; only the first call does anything
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Provider registry already closed");
            return false;
        }

        for (provider_id, entry) in &self.providers {
            if let Err(e) = entry.provider.close().await {
                warn!("Failed to close provider {}: {}", provider_id, e);
            }
        }
        debug!("Closed {} providers", self.providers.len());
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
