// ABOUTME: Execution records produced by a workflow run
// ABOUTME: Defines ability executions, per-stage logs, and the final output record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::stage::{StageId, StageMode};
use super::ticket::TicketStatus;
use crate::JsonMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AbilityOutcome {
    Success,
    Error,
}

/// One ability call; never mutated after the registry hands it back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbilityExecution {
    pub capability_name: String,
    pub provider_id: String,
    pub issued_at: DateTime<Utc>,
    pub outcome: AbilityOutcome,
    pub result: Option<JsonMap>,
    pub error: Option<String>,
}

impl AbilityExecution {
    pub fn success(
        capability_name: &str,
        provider_id: &str,
        issued_at: DateTime<Utc>,
        result: JsonMap,
    ) -> Self {
        Self {
            capability_name: capability_name.to_string(),
            provider_id: provider_id.to_string(),
            issued_at,
            outcome: AbilityOutcome::Success,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(
        capability_name: &str,
        provider_id: &str,
        issued_at: DateTime<Utc>,
        error: String,
    ) -> Self {
        Self {
            capability_name: capability_name.to_string(),
            provider_id: provider_id.to_string(),
            issued_at,
            outcome: AbilityOutcome::Error,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AbilityOutcome::Success
    }
}

/// Log of a single stage attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageLog {
    pub stage_name: String,
    pub stage_index: u8,
    pub mode: StageMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub executions: Vec<AbilityExecution>,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl StageLog {
    pub fn open(stage: StageId) -> Self {
        Self {
            stage_name: stage.name().to_string(),
            stage_index: stage.index(),
            mode: stage.mode(),
            started_at: Utc::now(),
            ended_at: None,
            executions: Vec::new(),
            succeeded: false,
            error: None,
        }
    }

    pub fn record(&mut self, execution: AbilityExecution) {
        self.executions.push(execution);
    }

    /// Close the attempt; a second call is ignored so `ended_at` is written once
    pub fn close(&mut self, error: Option<String>) {
        if self.ended_at.is_some() {
            warn!("Stage {} closed twice; keeping first result", self.stage_name);
            return;
        }
        self.ended_at = Some(Utc::now());
        self.succeeded = error.is_none();
        self.error = error;
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Final, immutable summary of one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputRecord {
    pub ticket_id: String,
    pub status: TicketStatus,
    pub response: Option<String>,
    pub confidence_score: f64,
    pub escalation_reason: Option<String>,
    pub stage_logs: Vec<StageLog>,
    /// Seconds from run start to record creation
    pub processing_time: f64,
    pub completion_time: DateTime<Utc>,
    pub agent_name: String,
    pub agent_version: String,
    pub final_payload: Option<JsonMap>,
    #[serde(default)]
    pub cancelled: bool,
}

impl OutputRecord {
    pub fn failed_stages(&self) -> Vec<&StageLog> {
        self.stage_logs.iter().filter(|log| !log.succeeded).collect()
    }

    /// True when any stage failed; the caller decides whether to retry
    pub fn is_degraded(&self) -> bool {
        self.stage_logs.iter().any(|log| !log.succeeded)
    }

    pub fn stage_log(&self, stage: StageId) -> Option<&StageLog> {
        self.stage_logs
            .iter()
            .find(|log| log.stage_index == stage.index())
    }

    pub fn ran_stage(&self, stage: StageId) -> bool {
        self.stage_log(stage).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_log_lifecycle() {
        let mut log = StageLog::open(StageId::Retrieve);
        assert_eq!(log.stage_name, "RETRIEVE");
        assert_eq!(log.stage_index, 6);
        assert_eq!(log.mode, StageMode::Deterministic);
        assert!(!log.is_closed());
        assert!(log.duration().is_none());

        log.record(AbilityExecution::failure(
            "knowledge_base_search",
            "ATLAS",
            Utc::now(),
            "connection refused".to_string(),
        ));
        log.close(Some("knowledge base unavailable".to_string()));

        assert!(log.is_closed());
        assert!(!log.succeeded);
        assert_eq!(log.executions.len(), 1);
        assert!(!log.executions[0].is_success());
    }

    #[test]
    fn test_stage_log_closes_once() {
        let mut log = StageLog::open(StageId::Intake);
        log.close(None);
        let first_end = log.ended_at;

        log.close(Some("late failure".to_string()));

        assert_eq!(log.ended_at, first_end);
        assert!(log.succeeded);
        assert!(log.error.is_none());
    }

    #[test]
    fn test_ability_execution_serializes_lowercase_outcome() {
        let mut result = JsonMap::new();
        result.insert("status".to_string(), "payload_accepted".into());
        let exec = AbilityExecution::success("accept_payload", "internal", Utc::now(), result);

        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["capability_name"], "accept_payload");
        assert_eq!(value["result"]["status"], "payload_accepted");
        assert!(value["error"].is_null());
    }
}
