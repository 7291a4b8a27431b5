// ABOUTME: Template context built from the current ticket state
// ABOUTME: Gives prompt templates flat access to customer, query, entities and knowledge-base hits

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::error::Result;
use crate::engine::TicketState;

#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub ticket: TicketInfo,
    pub entities: IndexMap<String, JsonValue>,
    pub kb_titles: Vec<String>,
    pub kb_result_count: usize,
    pub solutions: IndexMap<String, f64>,
    pub confidence_score: f64,
    pub clarification_question: Option<String>,
    pub human_response: Option<String>,
    pub rendered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketInfo {
    pub id: String,
    pub customer_name: String,
    pub contact: String,
    pub query_text: String,
    pub priority: String,
}

impl TemplateContext {
    /// Capture the fields prompt templates may reference
    pub fn for_ticket(state: &TicketState) -> Self {
        let input = state.input();
        let kb_titles = state
            .knowledge_base_results
            .iter()
            .filter_map(|hit| hit.get("title").and_then(JsonValue::as_str))
            .map(str::to_string)
            .collect();

        Self {
            ticket: TicketInfo {
                id: input.id.clone(),
                customer_name: input.customer_name.clone(),
                contact: input.contact.clone(),
                query_text: input.query_text.clone(),
                priority: input.priority.to_string().to_uppercase(),
            },
            entities: state.extracted_entities.clone(),
            kb_titles,
            kb_result_count: state.knowledge_base_results.len(),
            solutions: state.solution_scores.clone(),
            confidence_score: state.confidence_score,
            clarification_question: state.clarification_question.clone(),
            human_response: state.human_response.clone(),
            rendered_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}
