// ABOUTME: Workflow engine driving a ticket through the stage graph
// ABOUTME: Owns per-stage logging, error isolation, escalation, cancellation and provider teardown

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{EngineError, Result, StageError};
use super::escalation::{EscalationDecision, EscalationPolicy};
use super::graph;
use super::result::{OutputRecord, StageLog};
use super::stage::{Stage, StageCatalog, StageId, StageResults};
use super::state::TicketState;
use super::ticket::InputRecord;
use crate::advice::{is_affirmative, AdviceKind, Advisor, PromptBuilder};
use crate::providers::{ProviderError, ProviderRegistry};

/// Builds a fresh provider registry for each run
pub type RegistryFactory =
    Arc<dyn Fn() -> std::result::Result<ProviderRegistry, ProviderError> + Send + Sync>;

pub const DEFAULT_AGENT_NAME: &str = "Langie";
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub agent_name: String,
    pub agent_version: String,
    pub max_concurrent_tickets: usize,
    pub run_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            agent_version: DEFAULT_AGENT_VERSION.to_string(),
            max_concurrent_tickets: 4,
            run_timeout: None,
        }
    }
}

pub struct WorkflowEngine {
    catalog: StageCatalog,
    registry_factory: RegistryFactory,
    advisor: Arc<dyn Advisor>,
    prompts: PromptBuilder,
    policy: EscalationPolicy,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("advisor", &self.advisor.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Closes a run's providers and stops its timer on every exit path.
/// If the `process` future is dropped mid-run, the close is spawned onto the current runtime.
struct RunTeardown {
    registry: Arc<ProviderRegistry>,
    timer: Option<JoinHandle<()>>,
}

impl RunTeardown {
    fn new(registry: Arc<ProviderRegistry>, timer: Option<JoinHandle<()>>) -> Self {
        Self { registry, timer }
    }

    async fn finish(mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.registry.close().await;
    }
}

impl Drop for RunTeardown {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if self.registry.is_closed() {
            return;
        }

        let registry = Arc::clone(&self.registry);
        match Handle::try_current() {
            Ok(handle) => {
                warn!("Run dropped before completion, closing providers in the background");
                handle.spawn(async move {
                    registry.close().await;
                });
            }
            Err(_) => warn!("Run dropped outside a runtime, providers left open"),
        }
    }
}

impl WorkflowEngine {
    pub fn new(
        registry_factory: RegistryFactory,
        advisor: Arc<dyn Advisor>,
        config: EngineConfig,
    ) -> Result<Self> {
        let prompts = PromptBuilder::new(&config.agent_name)
            .map_err(|e| EngineError::Runtime(format!("Failed to build prompts: {}", e)))?;

        Ok(Self {
            catalog: StageCatalog::standard(),
            registry_factory,
            advisor,
            prompts,
            policy: EscalationPolicy::new(),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the stage table, e.g. one with rerouted abilities
    pub fn with_catalog(mut self, catalog: StageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Share a caller-owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel in-flight runs; later runs stop at their first stage
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Run one ticket through the graph and produce its output record
    #[instrument(skip(self, input), fields(ticket_id = %input.id))]
    pub async fn process(&self, input: InputRecord) -> Result<OutputRecord> {
        let started = Instant::now();

        let registry = (self.registry_factory)().map_err(|e| {
            error!("Failed to build provider registry: {}", e);
            EngineError::Registry(e)
        })?;
        let registry = Arc::new(registry);

        let run_token = self.cancel.child_token();
        let timer = self.config.run_timeout.map(|limit| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                token.cancel();
            })
        });
        let teardown = RunTeardown::new(Arc::clone(&registry), timer);

        let outcome = self.run(input, &registry, &run_token, started).await;
        teardown.finish().await;

        match &outcome {
            Ok(record) => info!(
                "Run finished for {} with status {} in {:.2}s",
                record.ticket_id, record.status, record.processing_time
            ),
            Err(e) => error!("Run failed: {}", e),
        }
        outcome
    }

    /// Process tickets concurrently, bounded by `max_concurrent_tickets`; results keep input order
    pub async fn process_batch(&self, inputs: Vec<InputRecord>) -> Vec<Result<OutputRecord>> {
        if inputs.is_empty() {
            return Vec::new();
        }

        info!("Processing batch of {} tickets", inputs.len());
        let semaphore = Semaphore::new(self.config.max_concurrent_tickets.max(1));
        let semaphore = &semaphore;

        let runs = inputs.into_iter().map(|input| async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| EngineError::Runtime(format!("Semaphore closed: {}", e)))?;
            self.process(input).await
        });

        join_all(runs).await
    }

    /// Drive `process` on a private current-thread runtime.
    /// Must not be called from inside an async context.
    pub fn process_blocking(&self, input: InputRecord) -> Result<OutputRecord> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Runtime(format!("Failed to start runtime: {}", e)))?;
        runtime.block_on(self.process(input))
    }

    async fn run(
        &self,
        input: InputRecord,
        registry: &ProviderRegistry,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<OutputRecord> {
        let mut state = TicketState::new(input)?;
        info!("Starting workflow for ticket {}", state.ticket_id());

        let mut cancelled = false;
        let mut current = Some(graph::first_stage());
        while let Some(stage_id) = current {
            let stage = self.catalog.get(stage_id);
            let (log, stage_cancelled) = self.run_stage(stage, &mut state, registry, token).await;
            cancelled = stage_cancelled;
            state.push_log(log);

            if cancelled {
                warn!("Run cancelled during stage {}", stage_id);
                break;
            }
            current = graph::next_stage(stage_id, &state);
        }

        Ok(self.output_record(state, started, cancelled))
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        state: &mut TicketState,
        registry: &ProviderRegistry,
        token: &CancellationToken,
    ) -> (StageLog, bool) {
        let mut log = StageLog::open(stage.id);
        info!(
            "{} Starting stage {}: {} (mode: {})",
            stage.id.emoji(),
            stage.id.index(),
            stage.id,
            stage.id.mode()
        );

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(StageError::Cancelled {
                reason: self.cancel_reason(),
            }),
            result = self.execute_stage(stage, state, registry, &mut log) => result,
        };

        let cancelled = matches!(&outcome, Err(e) if e.is_cancellation());
        if stage.id == StageId::Decide && !cancelled {
            self.apply_escalation_policy(state);
        }

        match outcome {
            Ok(()) => log.close(None),
            Err(e) => {
                warn!("Stage {} failed: {}", stage.id, e);
                log.close(Some(e.to_string()));
            }
        }

        if let Some(duration) = log.duration() {
            info!(
                "Completed stage {}: {} ({:.2}s, succeeded: {})",
                stage.id.index(),
                stage.id,
                duration.as_secs_f64(),
                log.succeeded
            );
        }
        (log, cancelled)
    }

    async fn execute_stage(
        &self,
        stage: &Stage,
        state: &mut TicketState,
        registry: &ProviderRegistry,
        log: &mut StageLog,
    ) -> std::result::Result<(), StageError> {
        if let Some(kind) = stage.advice {
            self.consult_advisor(kind, state).await?;
        }

        let planned: Vec<_> = stage.planned_abilities(state).cloned().collect();
        let mut results = StageResults::new();
        let mut errors = Vec::new();

        for ability in planned {
            let mut payload = state.snapshot();
            payload.insert(
                "stage_results".to_string(),
                serde_json::to_value(&results).unwrap_or_default(),
            );

            let execution = registry
                .execute(&ability.provider_id, &ability.capability, &payload)
                .await;

            match (&execution.result, &execution.error) {
                (Some(result), _) if execution.is_success() => {
                    results.insert(ability.capability.clone(), result.clone());
                }
                (_, error) => errors.push(StageError::AbilityFailed {
                    capability: ability.capability.clone(),
                    provider_id: ability.provider_id.clone(),
                    message: error.clone().unwrap_or_else(|| "no result".to_string()),
                }),
            }
            log.record(execution);
        }

        if let Err(e) = stage.apply(&results, state) {
            errors.push(e);
        }

        match StageError::combine(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn consult_advisor(
        &self,
        kind: AdviceKind,
        state: &mut TicketState,
    ) -> std::result::Result<(), StageError> {
        let request = self.prompts.build(kind, state)?;
        let reply = self.advisor.advise(&request).await?;
        debug!("{} advice from {}: {}", kind, self.advisor.name(), reply);

        match kind {
            AdviceKind::Clarification => {
                state.clarification_requested = is_affirmative(&reply);
            }
            AdviceKind::Decision => {
                state.decision_guidance = Some(reply);
            }
        }
        Ok(())
    }

    fn apply_escalation_policy(&self, state: &mut TicketState) {
        match self.policy.enforce(state) {
            EscalationDecision::Escalate { reason, forced } => {
                if forced {
                    warn!("Forcing escalation: {}", reason);
                } else {
                    info!("Escalating: {}", reason);
                }
            }
            EscalationDecision::Proceed => {
                debug!(
                    "Confidence {} meets threshold {}",
                    state.confidence_score,
                    self.policy.threshold()
                );
            }
        }
    }

    fn cancel_reason(&self) -> String {
        if self.cancel.is_cancelled() {
            "cancelled by caller".to_string()
        } else {
            match self.config.run_timeout {
                Some(limit) => format!("run timeout of {:?} exceeded", limit),
                None => "cancelled".to_string(),
            }
        }
    }

    fn output_record(&self, mut state: TicketState, started: Instant, cancelled: bool) -> OutputRecord {
        OutputRecord {
            ticket_id: state.ticket_id().to_string(),
            status: state.status,
            response: state.generated_response.take(),
            confidence_score: state.confidence_score,
            escalation_reason: state.escalation_reason.take(),
            stage_logs: std::mem::take(&mut state.stage_logs),
            processing_time: started.elapsed().as_secs_f64(),
            completion_time: Utc::now(),
            agent_name: self.config.agent_name.clone(),
            agent_version: self.config.agent_version.clone(),
            final_payload: state.final_payload.take(),
            cancelled,
        }
    }
}
