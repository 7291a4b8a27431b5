// ABOUTME: Command implementations for the ticketflow CLI
// ABOUTME: Handles execution of run, demo, validate, and stages commands

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::args::Scenario;
use super::config::Config;
use crate::engine::stage::{AbilityCondition, ATLAS, COMMON};
use crate::engine::{InputRecord, OutputRecord, Priority, RegistryFactory, WorkflowEngine};
use crate::output::config::OutputConfig;
use crate::output::OutputHandler;
use crate::providers::catalog::solution_evaluation_with_best;
use crate::providers::{ProviderError, ProviderRegistry, SimulatedProvider, INTERNAL_PROVIDER};

const DEMO_LATENCY: Duration = Duration::from_millis(100);

/// Process every ticket in a file
#[allow(clippy::too_many_arguments)]
pub async fn run_tickets(
    tickets_path: PathBuf,
    output: Option<String>,
    per_ticket: bool,
    format: Option<String>,
    max_concurrent: Option<usize>,
    timeout: Option<u64>,
    strict: bool,
    config: &Config,
) -> Result<()> {
    info!("Loading tickets from {}", tickets_path.display());
    let records = InputRecord::load_all(&tickets_path)
        .await
        .context("Failed to load tickets")?;
    info!("Loaded {} tickets", records.len());

    let mut config = config.clone();
    if let Some(max_concurrent) = max_concurrent {
        config.max_concurrent_tickets = max_concurrent;
    }
    if timeout.is_some() {
        config.run_timeout_secs = timeout;
    }

    let engine = config.build_engine().context("Failed to build engine")?;
    let outputs = process_with_interrupt(&engine, records).await;

    let mut completed = Vec::new();
    let mut failures = 0;
    for result in outputs {
        match result {
            Ok(record) => completed.push(record),
            Err(e) => {
                error!("Ticket could not be processed: {}", e);
                failures += 1;
            }
        }
    }

    write_records(&completed, output_config(&config, format, output, per_ticket)).await?;

    if failures > 0 {
        anyhow::bail!("{} tickets could not be processed", failures);
    }

    let degraded = completed.iter().filter(|r| r.is_degraded()).count();
    if degraded > 0 {
        warn!("{} tickets finished with failed stages", degraded);
        if strict {
            anyhow::bail!("{} tickets finished with failed stages", degraded);
        }
    }

    info!("Processed {} tickets", completed.len());
    Ok(())
}

/// Run the sample ticket through simulated providers shaped for `scenario`
pub async fn run_demo(scenario: Scenario, format: Option<String>, config: &Config) -> Result<()> {
    info!("Running demo scenario {:?}", scenario);

    let engine = WorkflowEngine::new(
        demo_registry_factory(scenario),
        config.advisor()?,
        config.engine_config(),
    )?;

    let mut ticket = InputRecord::sample();
    if scenario == Scenario::Clarify {
        ticket.priority = Priority::Medium;
    }

    let record = engine.process(ticket).await?;
    let output = output_config(
        config,
        format.or_else(|| Some("text".to_string())),
        None,
        false,
    );
    write_records(std::slice::from_ref(&record), output).await
}

/// Validate a ticket file without processing it
pub async fn validate_tickets(tickets_path: PathBuf, config: &Config) -> Result<()> {
    info!("Validating tickets: {}", tickets_path.display());

    let records = InputRecord::load_all(&tickets_path)
        .await
        .context("Ticket validation failed")?;

    let mut invalid = 0;
    for record in &records {
        match record.validate() {
            Ok(()) => println!("  ✓ {} ({}, {})", record.id, record.customer_name, record.priority),
            Err(e) => {
                println!("  ✗ {}", e);
                invalid += 1;
            }
        }
    }

    for provider_id in config.stage_catalog().provider_ids() {
        if provider_id != INTERNAL_PROVIDER && !config.providers.contains_key(&provider_id) {
            warn!("Stages route abilities to unconfigured provider {}", provider_id);
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} tickets are invalid", invalid, records.len());
    }

    println!("✓ {} tickets are valid", records.len());
    Ok(())
}

/// Print the stage table with each stage's abilities
pub fn list_stages(config: &Config) -> Result<()> {
    let catalog = config.stage_catalog();

    for stage in catalog.iter() {
        println!(
            "{} {:>2} {:<10} [{}] {}",
            stage.id.emoji(),
            stage.id.index(),
            stage.id.name(),
            stage.id.mode(),
            stage.description
        );
        if let Some(kind) = stage.advice {
            println!("       advice: {}", kind);
        }
        for ability in &stage.abilities {
            let condition = match ability.condition {
                AbilityCondition::Always => "",
                AbilityCondition::WhenClarificationRequested => " (when clarification requested)",
            };
            println!(
                "       - {} @ {}{}",
                ability.capability, ability.provider_id, condition
            );
        }
    }

    Ok(())
}

/// Process a batch, cancelling in-flight runs on Ctrl-C
async fn process_with_interrupt(
    engine: &WorkflowEngine,
    records: Vec<InputRecord>,
) -> Vec<crate::engine::Result<OutputRecord>> {
    let token = engine.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight tickets");
            token.cancel();
        }
    });

    let outputs = engine.process_batch(records).await;
    interrupt.abort();
    outputs
}

fn output_config(
    config: &Config,
    format: Option<String>,
    output: Option<String>,
    per_ticket: bool,
) -> OutputConfig {
    let mut output_config = config.output.clone();
    if let Some(format) = format {
        output_config = output_config.with_format(format);
    }
    match output {
        Some(dir) if per_ticket => output_config.to_ticket_dir(dir),
        Some(path) => output_config.to_file(path),
        None => output_config,
    }
}

async fn write_records(records: &[OutputRecord], output: OutputConfig) -> Result<()> {
    OutputHandler::new()
        .output_records(records, &output)
        .await
        .context("Failed to write output records")
}

fn demo_registry_factory(scenario: Scenario) -> RegistryFactory {
    Arc::new(move || -> std::result::Result<ProviderRegistry, ProviderError> {
        let mut atlas = SimulatedProvider::new(ATLAS).with_latency(DEMO_LATENCY);
        let mut common = SimulatedProvider::new(COMMON).with_latency(DEMO_LATENCY);

        match scenario {
            Scenario::Escalated => {
                common = common
                    .with_response("solution_evaluation", solution_evaluation_with_best(40.0));
            }
            Scenario::Degraded => {
                atlas = atlas.with_failure("knowledge_base_search", "knowledge base offline");
            }
            Scenario::Resolved | Scenario::Clarify => {}
        }

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(atlas))?;
        registry.register(Arc::new(common))?;
        Ok(registry)
    })
}
