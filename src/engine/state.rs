// ABOUTME: The mutable ticket state threaded through every stage of one run
// ABOUTME: Provides the payload snapshot handed to ability providers and stage log bookkeeping

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::error::Result;
use super::escalation::ProviderVerdict;
use super::result::StageLog;
use super::ticket::{InputRecord, TicketStatus};
use crate::JsonMap;

/// Single-owner aggregate for one run; never shared between runs
#[derive(Debug, Clone, Serialize)]
pub struct TicketState {
    input: InputRecord,
    pub current_stage: u8,
    pub processing_complete: bool,

    pub extracted_entities: IndexMap<String, JsonValue>,
    pub normalized_fields: IndexMap<String, JsonValue>,
    pub enrichment: IndexMap<String, JsonValue>,
    pub knowledge_base_results: Vec<JsonMap>,

    pub solution_scores: IndexMap<String, f64>,
    pub confidence_score: f64,
    pub provider_verdict: Option<ProviderVerdict>,
    pub escalation_needed: bool,
    pub escalation_reason: Option<String>,
    pub decision_guidance: Option<String>,

    pub clarification_requested: bool,
    pub clarification_question: Option<String>,
    pub human_response: Option<String>,

    pub generated_response: Option<String>,
    pub executed_actions: Vec<JsonValue>,
    pub notifications: Vec<JsonValue>,
    pub final_payload: Option<JsonMap>,

    pub status: TicketStatus,
    pub stage_logs: Vec<StageLog>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketState {
    /// Start a run; fails when the record is unusable
    pub fn new(input: InputRecord) -> Result<Self> {
        input.validate()?;
        let now = Utc::now();

        Ok(Self {
            input,
            current_stage: 0,
            processing_complete: false,
            extracted_entities: IndexMap::new(),
            normalized_fields: IndexMap::new(),
            enrichment: IndexMap::new(),
            knowledge_base_results: Vec::new(),
            solution_scores: IndexMap::new(),
            confidence_score: 0.0,
            provider_verdict: None,
            escalation_needed: false,
            escalation_reason: None,
            decision_guidance: None,
            clarification_requested: false,
            clarification_question: None,
            human_response: None,
            generated_response: None,
            executed_actions: Vec::new(),
            notifications: Vec::new(),
            final_payload: None,
            status: TicketStatus::Pending,
            stage_logs: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn input(&self) -> &InputRecord {
        &self.input
    }

    pub fn ticket_id(&self) -> &str {
        &self.input.id
    }

    /// Append a finished stage log; open logs are never stored
    pub fn push_log(&mut self, log: StageLog) {
        debug_assert!(log.is_closed(), "stage log pushed before close");
        self.current_stage = log.stage_index;
        self.stage_logs.push(log);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Waiting on the customer: a question went out and nothing came back yet
    pub fn awaiting_human_response(&self) -> bool {
        self.clarification_requested && self.human_response.is_none()
    }

    /// JSON view of the state handed to providers; input fields sit at the top level
    pub fn snapshot(&self) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("ticket_id".to_string(), self.input.id.clone().into());
        map.insert(
            "customer_name".to_string(),
            self.input.customer_name.clone().into(),
        );
        map.insert("contact".to_string(), self.input.contact.clone().into());
        map.insert("email".to_string(), self.input.contact.clone().into());
        map.insert("query_text".to_string(), self.input.query_text.clone().into());
        map.insert("priority".to_string(), self.input.priority.to_string().into());

        if let Ok(JsonValue::Object(fields)) = serde_json::to_value(self) {
            for (key, value) in fields {
                if key != "input" && key != "stage_logs" {
                    map.insert(key, value);
                }
            }
        }

        map
    }
}
