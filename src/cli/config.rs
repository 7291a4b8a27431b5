// ABOUTME: Configuration management for the ticketflow application
// ABOUTME: Loads YAML settings, merges environment overrides, and builds the engine's collaborators

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::advice::{Advisor, ChatAdvisor, ChatConfig, RulesAdvisor, ScriptedAdvisor};
use crate::engine::executor::{DEFAULT_AGENT_NAME, DEFAULT_AGENT_VERSION};
use crate::engine::stage::{ATLAS, COMMON};
use crate::engine::{EngineConfig, RegistryFactory, StageCatalog, WorkflowEngine};
use crate::output::config::OutputConfig;
use crate::providers::{
    AbilityProvider, HttpProvider, ProviderError, ProviderRegistry, SimulatedProvider,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tickets: usize,

    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(default = "default_providers")]
    pub providers: IndexMap<String, ProviderConfig>,

    #[serde(default)]
    pub ability_routes: HashMap<String, String>,

    #[serde(default)]
    pub advice: AdviceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Simulated,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdviceBackend {
    Rules,
    Scripted,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceConfig {
    #[serde(default = "default_advice_backend")]
    pub backend: AdviceBackend,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub clarification_reply: Option<String>,
    #[serde(default)]
    pub decision_reply: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Latency applied to simulated providers that do not set their own
const DEFAULT_SIMULATED_LATENCY_MS: u64 = 100;

fn default_max_concurrent() -> usize {
    4
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Simulated
}

fn default_provider_timeout() -> u64 {
    30
}

fn default_advice_backend() -> AdviceBackend {
    AdviceBackend::Rules
}

fn default_model() -> String {
    crate::advice::chat::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_providers() -> IndexMap<String, ProviderConfig> {
    let mut providers = IndexMap::new();
    providers.insert(
        ATLAS.to_string(),
        ProviderConfig::simulated("http://localhost:8001"),
    );
    providers.insert(
        COMMON.to_string(),
        ProviderConfig::simulated("http://localhost:8002"),
    );
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            max_concurrent_tickets: default_max_concurrent(),
            run_timeout_secs: None,
            providers: default_providers(),
            ability_routes: HashMap::new(),
            advice: AdviceConfig::default(),
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            version: DEFAULT_AGENT_VERSION.to_string(),
        }
    }
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            backend: default_advice_backend(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: None,
            api_key: None,
            clarification_reply: None,
            decision_reply: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn simulated(url: &str) -> Self {
        Self {
            kind: ProviderKind::Simulated,
            url: Some(url.to_string()),
            key: None,
            timeout_secs: default_provider_timeout(),
            latency_ms: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn build(
        &self,
        provider_id: &str,
        client: &reqwest::Client,
    ) -> Result<Arc<dyn AbilityProvider>> {
        match self.kind {
            ProviderKind::Simulated => {
                let latency = self.latency_ms.unwrap_or(DEFAULT_SIMULATED_LATENCY_MS);
                Ok(Arc::new(
                    SimulatedProvider::new(provider_id)
                        .with_latency(Duration::from_millis(latency)),
                ))
            }
            ProviderKind::Http => {
                let url = self.url.as_deref().with_context(|| {
                    format!("Provider {} is an http provider without a url", provider_id)
                })?;
                Ok(Arc::new(
                    HttpProvider::new(provider_id, url, client.clone())
                        .with_api_key(self.key.clone()),
                ))
            }
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config: Config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("ticketflow.yaml"),
            PathBuf::from("ticketflow.yml"),
            PathBuf::from(".ticketflow.yaml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".ticketflow").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path (may not exist)
        PathBuf::from("ticketflow.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        for provider_id in [ATLAS, COMMON] {
            if let Ok(url) = std::env::var(format!("{}_SERVER_URL", provider_id)) {
                // A configured URL means a real server
                let provider = self
                    .providers
                    .entry(provider_id.to_string())
                    .or_insert_with(|| ProviderConfig::simulated(&url));
                provider.kind = ProviderKind::Http;
                provider.url = Some(url);
            }
            if let Ok(key) = std::env::var(format!("{}_SERVER_KEY", provider_id)) {
                if let Some(provider) = self.providers.get_mut(provider_id) {
                    provider.key = Some(key);
                }
            }
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.advice.api_key = Some(api_key);
        }

        if let Ok(level) = std::env::var("TICKETFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TICKETFLOW_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(max_tickets) = std::env::var("TICKETFLOW_MAX_CONCURRENT") {
            self.max_concurrent_tickets = max_tickets
                .parse()
                .context("TICKETFLOW_MAX_CONCURRENT must be a positive integer")?;
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            agent_name: self.agent.name.clone(),
            agent_version: self.agent.version.clone(),
            max_concurrent_tickets: self.max_concurrent_tickets.max(1),
            run_timeout: self.run_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Registry factory over the configured providers, sharing one HTTP client
    pub fn registry_factory(&self) -> Result<RegistryFactory> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        let providers = self.providers.clone();

        // Fail on bad provider settings now instead of on every run
        for (provider_id, provider) in &providers {
            provider.build(provider_id, &client)?;
        }

        Ok(Arc::new(move || -> std::result::Result<ProviderRegistry, ProviderError> {
            let mut registry = ProviderRegistry::new();
            for (provider_id, provider) in &providers {
                let built = provider
                    .build(provider_id, &client)
                    .map_err(|e| ProviderError::Configuration(e.to_string()))?;
                registry.register_with_timeout(built, provider.timeout())?;
            }
            Ok(registry)
        }))
    }

    pub fn advisor(&self) -> Result<Arc<dyn Advisor>> {
        let advice = &self.advice;
        match advice.backend {
            AdviceBackend::Rules => Ok(Arc::new(RulesAdvisor::new())),
            AdviceBackend::Scripted => Ok(Arc::new(ScriptedAdvisor::new(
                advice.clarification_reply.as_deref().unwrap_or("NO"),
                advice.decision_reply.as_deref().unwrap_or(""),
            ))),
            AdviceBackend::Chat => {
                let mut chat = ChatConfig {
                    api_key: advice.api_key.clone(),
                    model: advice.model.clone(),
                    temperature: advice.temperature,
                    max_tokens: advice.max_tokens,
                    ..ChatConfig::default()
                };
                if let Some(base_url) = &advice.base_url {
                    chat.base_url = base_url.clone();
                }
                Ok(Arc::new(ChatAdvisor::new(chat)?))
            }
        }
    }

    pub fn stage_catalog(&self) -> StageCatalog {
        StageCatalog::standard().with_routes(&self.ability_routes)
    }

    /// Engine wired from this configuration
    pub fn build_engine(&self) -> Result<WorkflowEngine> {
        let engine = WorkflowEngine::new(
            self.registry_factory()?,
            self.advisor()?,
            self.engine_config(),
        )?
        .with_catalog(self.stage_catalog());
        Ok(engine)
    }
}
