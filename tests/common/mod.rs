// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Builds engines over simulated providers, counts provider teardown, and writes ticket files

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

use ticketflow::advice::{Advisor, ScriptedAdvisor};
use ticketflow::engine::stage::{ATLAS, COMMON};
use ticketflow::engine::{EngineConfig, InputRecord, Priority, RegistryFactory, WorkflowEngine};
use ticketflow::providers::{AbilityProvider, ProviderError, ProviderRegistry, SimulatedProvider};
use ticketflow::JsonMap;

/// Wraps a provider and counts how often it is closed
pub struct CountingProvider {
    inner: SimulatedProvider,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl AbilityProvider for CountingProvider {
    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    async fn execute(&self, capability: &str, payload: &JsonMap) -> Result<JsonMap, ProviderError> {
        self.inner.execute(capability, payload).await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

#[derive(Clone)]
enum Tweak {
    Response(String, String, JsonValue),
    Failure(String, String, String),
}

pub struct TestEngineBuilder {
    tweaks: Vec<Tweak>,
    latency: Duration,
    advisor: Arc<dyn Advisor>,
    config: EngineConfig,
}

/// Handle to the engine plus the teardown counters of every registry it built
pub struct TestEngine {
    pub engine: WorkflowEngine,
    pub closes: Arc<AtomicUsize>,
    pub registries_built: Arc<AtomicUsize>,
}

impl TestEngine {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn registries_built(&self) -> usize {
        self.registries_built.load(Ordering::SeqCst)
    }
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self {
            tweaks: Vec::new(),
            latency: Duration::ZERO,
            advisor: Arc::new(ScriptedAdvisor::new("NO", "Apply the highest scoring fix.")),
            config: EngineConfig::default(),
        }
    }

    pub fn with_advisor<A: Advisor + 'static>(mut self, advisor: A) -> Self {
        self.advisor = Arc::new(advisor);
        self
    }

    pub fn with_shared_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_response(mut self, provider_id: &str, capability: &str, response: JsonValue) -> Self {
        self.tweaks.push(Tweak::Response(
            provider_id.to_string(),
            capability.to_string(),
            response,
        ));
        self
    }

    pub fn with_failure(mut self, provider_id: &str, capability: &str, message: &str) -> Self {
        self.tweaks.push(Tweak::Failure(
            provider_id.to_string(),
            capability.to_string(),
            message.to_string(),
        ));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.config.run_timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.config.max_concurrent_tickets = max;
        self
    }

    pub fn registry_factory(&self) -> (RegistryFactory, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let built = Arc::new(AtomicUsize::new(0));
        let tweaks = self.tweaks.clone();
        let latency = self.latency;

        let factory_closes = closes.clone();
        let factory_built = built.clone();
        let factory: RegistryFactory = Arc::new(move || -> Result<ProviderRegistry, ProviderError> {
            factory_built.fetch_add(1, Ordering::SeqCst);
            let mut registry = ProviderRegistry::new();

            for provider_id in [ATLAS, COMMON] {
                let mut provider = SimulatedProvider::new(provider_id).with_latency(latency);
                for tweak in &tweaks {
                    provider = match tweak {
                        Tweak::Response(id, capability, response) if id == provider_id => {
                            provider.with_response(capability, response.clone())
                        }
                        Tweak::Failure(id, capability, message) if id == provider_id => {
                            provider.with_failure(capability, message)
                        }
                        _ => provider,
                    };
                }
                registry.register(Arc::new(CountingProvider {
                    inner: provider,
                    closes: factory_closes.clone(),
                }))?;
            }
            Ok(registry)
        });

        (factory, closes, built)
    }

    pub fn build(self) -> TestEngine {
        let (factory, closes, registries_built) = self.registry_factory();
        let engine = WorkflowEngine::new(factory, self.advisor, self.config).unwrap();
        TestEngine {
            engine,
            closes,
            registries_built,
        }
    }
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn login_ticket(id: &str) -> InputRecord {
    InputRecord::sample().with_id(id)
}

pub fn ticket(id: &str, priority: Priority) -> InputRecord {
    InputRecord::new(
        "Ada Lovelace",
        "ada@example.com",
        "My invoice shows the wrong amount.",
        priority,
    )
    .with_id(id)
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub async fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).await.unwrap();
        path
    }

    /// Config that keeps simulated providers fast and logging quiet
    pub async fn write_fast_config(&self) -> PathBuf {
        self.write_file(
            "ticketflow.yaml",
            r#"
providers:
  ATLAS:
    latency_ms: 0
  COMMON:
    latency_ms: 0
logging:
  level: warn
  format: compact
"#,
        )
        .await
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
