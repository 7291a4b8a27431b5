// ABOUTME: Main library module for the ticketflow staged workflow engine
// ABOUTME: Exports all core modules and provides the public API

pub mod advice;
pub mod cli;
pub mod engine;
pub mod output;
pub mod providers;
pub mod template;

// Re-export commonly used types
pub use advice::{Advisor, ChatAdvisor, RulesAdvisor, ScriptedAdvisor};
pub use cli::{App, Args, Config};
pub use engine::{
    EngineConfig, InputRecord, OutputRecord, Priority, TicketStatus, WorkflowEngine,
};
pub use output::{OutputHandler, OutputProcessor};
pub use providers::{AbilityProvider, ProviderRegistry};

/// JSON object shape used for ability payloads and results
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
