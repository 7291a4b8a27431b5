// ABOUTME: Declarative stage records and the standard eleven-stage catalog
// ABOUTME: Each stage names its abilities in call order and how their results land in the ticket state

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::error::StageError;
use super::escalation::{EscalationPolicy, ProviderVerdict};
use super::state::TicketState;
use super::ticket::TicketStatus;
use crate::advice::AdviceKind;
use crate::providers::INTERNAL_PROVIDER;
use crate::JsonMap;

pub const ATLAS: &str = "ATLAS";
pub const COMMON: &str = "COMMON";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageMode {
    EntryOnly,
    Deterministic,
    NonDeterministic,
    HumanInteraction,
    OutputOnly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageId {
    Intake,
    Understand,
    Prepare,
    Ask,
    Wait,
    Retrieve,
    Decide,
    Update,
    Create,
    Do,
    Complete,
}

impl StageId {
    pub const ALL: [StageId; 11] = [
        StageId::Intake,
        StageId::Understand,
        StageId::Prepare,
        StageId::Ask,
        StageId::Wait,
        StageId::Retrieve,
        StageId::Decide,
        StageId::Update,
        StageId::Create,
        StageId::Do,
        StageId::Complete,
    ];

    /// 1-based position in the graph
    pub fn index(self) -> u8 {
        match self {
            StageId::Intake => 1,
            StageId::Understand => 2,
            StageId::Prepare => 3,
            StageId::Ask => 4,
            StageId::Wait => 5,
            StageId::Retrieve => 6,
            StageId::Decide => 7,
            StageId::Update => 8,
            StageId::Create => 9,
            StageId::Do => 10,
            StageId::Complete => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageId::Intake => "INTAKE",
            StageId::Understand => "UNDERSTAND",
            StageId::Prepare => "PREPARE",
            StageId::Ask => "ASK",
            StageId::Wait => "WAIT",
            StageId::Retrieve => "RETRIEVE",
            StageId::Decide => "DECIDE",
            StageId::Update => "UPDATE",
            StageId::Create => "CREATE",
            StageId::Do => "DO",
            StageId::Complete => "COMPLETE",
        }
    }

    pub fn mode(self) -> StageMode {
        match self {
            StageId::Intake => StageMode::EntryOnly,
            StageId::Ask => StageMode::HumanInteraction,
            StageId::Decide => StageMode::NonDeterministic,
            StageId::Complete => StageMode::OutputOnly,
            _ => StageMode::Deterministic,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            StageId::Intake => "📥",
            StageId::Understand => "🧠",
            StageId::Prepare => "🛠",
            StageId::Ask => "❓",
            StageId::Wait => "⏳",
            StageId::Retrieve => "📚",
            StageId::Decide => "⚖",
            StageId::Update => "🔄",
            StageId::Create => "✍",
            StageId::Do => "🏃",
            StageId::Complete => "✅",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for StageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageMode::EntryOnly => write!(f, "entry_only"),
            StageMode::Deterministic => write!(f, "deterministic"),
            StageMode::NonDeterministic => write!(f, "non_deterministic"),
            StageMode::HumanInteraction => write!(f, "human_interaction"),
            StageMode::OutputOnly => write!(f, "output_only"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbilityCondition {
    #[default]
    Always,
    WhenClarificationRequested,
}

impl AbilityCondition {
    pub fn holds(self, state: &TicketState) -> bool {
        match self {
            AbilityCondition::Always => true,
            AbilityCondition::WhenClarificationRequested => state.clarification_requested,
        }
    }
}

/// A (provider, capability) pair a stage calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbilityRef {
    pub provider_id: String,
    pub capability: String,
    #[serde(default)]
    pub condition: AbilityCondition,
}

impl AbilityRef {
    pub fn new(provider_id: &str, capability: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            capability: capability.to_string(),
            condition: AbilityCondition::Always,
        }
    }

    pub fn when(mut self, condition: AbilityCondition) -> Self {
        self.condition = condition;
        self
    }
}

/// Successful ability results of one stage attempt, keyed by capability in call order
pub type StageResults = IndexMap<String, JsonMap>;

pub type ApplyFn = fn(&StageResults, &mut TicketState) -> Result<(), StageError>;

pub struct Stage {
    pub id: StageId,
    pub description: &'static str,
    pub advice: Option<AdviceKind>,
    pub abilities: Vec<AbilityRef>,
    apply: ApplyFn,
}

impl Stage {
    pub fn new(id: StageId, description: &'static str, apply: ApplyFn) -> Self {
        Self {
            id,
            description,
            advice: None,
            abilities: Vec::new(),
            apply,
        }
    }

    pub fn with_ability(mut self, ability: AbilityRef) -> Self {
        self.abilities.push(ability);
        self
    }

    pub fn with_advice(mut self, kind: AdviceKind) -> Self {
        self.advice = Some(kind);
        self
    }

    /// Abilities due for this attempt, in declared order
    pub fn planned_abilities<'a>(&'a self, state: &'a TicketState) -> impl Iterator<Item = &'a AbilityRef> {
        self.abilities.iter().filter(move |a| a.condition.holds(state))
    }

    pub fn apply(&self, results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
        (self.apply)(results, state)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("advice", &self.advice)
            .field("abilities", &self.abilities)
            .finish()
    }
}

/// The full stage table, one entry per `StageId`
#[derive(Debug)]
pub struct StageCatalog {
    stages: Vec<Stage>,
}

impl StageCatalog {
    pub fn standard() -> Self {
        let stages = vec![
            Stage::new(StageId::Intake, "Accept the ticket payload", apply_intake)
                .with_ability(AbilityRef::new(INTERNAL_PROVIDER, "accept_payload")),
            Stage::new(
                StageId::Understand,
                "Parse the request and extract entities",
                apply_understand,
            )
            .with_ability(AbilityRef::new(COMMON, "parse_request_text"))
            .with_ability(AbilityRef::new(ATLAS, "extract_entities")),
            Stage::new(
                StageId::Prepare,
                "Normalize fields, enrich records, compute flags",
                apply_prepare,
            )
            .with_ability(AbilityRef::new(COMMON, "normalize_fields"))
            .with_ability(AbilityRef::new(ATLAS, "enrich_records"))
            .with_ability(AbilityRef::new(COMMON, "add_flags_calculations")),
            Stage::new(StageId::Ask, "Request clarification if needed", apply_ask)
                .with_advice(AdviceKind::Clarification)
                .with_ability(
                    AbilityRef::new(ATLAS, "clarify_question")
                        .when(AbilityCondition::WhenClarificationRequested),
                ),
            Stage::new(StageId::Wait, "Capture the customer's answer", apply_wait)
                .with_ability(AbilityRef::new(ATLAS, "extract_answer"))
                .with_ability(AbilityRef::new(INTERNAL_PROVIDER, "store_answer")),
            Stage::new(StageId::Retrieve, "Search the knowledge base", apply_retrieve)
                .with_ability(AbilityRef::new(ATLAS, "knowledge_base_search"))
                .with_ability(AbilityRef::new(INTERNAL_PROVIDER, "store_data")),
            Stage::new(
                StageId::Decide,
                "Score solutions and decide on escalation",
                apply_decide,
            )
            .with_advice(AdviceKind::Decision)
            .with_ability(AbilityRef::new(COMMON, "solution_evaluation"))
            .with_ability(AbilityRef::new(ATLAS, "escalation_decision"))
            .with_ability(AbilityRef::new(INTERNAL_PROVIDER, "update_payload")),
            Stage::new(StageId::Update, "Update and close the ticket", apply_update)
                .with_ability(AbilityRef::new(ATLAS, "update_ticket"))
                .with_ability(AbilityRef::new(ATLAS, "close_ticket")),
            Stage::new(StageId::Create, "Generate the customer response", apply_create)
                .with_ability(AbilityRef::new(COMMON, "response_generation")),
            Stage::new(StageId::Do, "Execute actions and notifications", apply_do)
                .with_ability(AbilityRef::new(ATLAS, "execute_api_calls"))
                .with_ability(AbilityRef::new(ATLAS, "trigger_notifications")),
            Stage::new(StageId::Complete, "Emit the final payload", apply_complete)
                .with_ability(AbilityRef::new(INTERNAL_PROVIDER, "output_payload")),
        ];

        Self { stages }
    }

    /// Re-bind capabilities to other providers, leaving call order untouched
    pub fn with_routes(mut self, routes: &HashMap<String, String>) -> Self {
        for stage in &mut self.stages {
            for ability in &mut stage.abilities {
                if let Some(provider_id) = routes.get(&ability.capability) {
                    ability.provider_id = provider_id.clone();
                }
            }
        }
        self
    }

    pub fn get(&self, id: StageId) -> &Stage {
        // The table holds exactly one stage per id, in index order
        &self.stages[usize::from(id.index() - 1)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    /// Every provider id any stage refers to
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for ability in self.stages.iter().flat_map(|s| s.abilities.iter()) {
            if !ids.contains(&ability.provider_id) {
                ids.push(ability.provider_id.clone());
            }
        }
        ids
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn object<'a>(result: &'a JsonMap, key: &str) -> Option<&'a JsonMap> {
    result.get(key).and_then(JsonValue::as_object)
}

fn text(result: &JsonMap, key: &str) -> Option<String> {
    result.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn merge_into(target: &mut IndexMap<String, JsonValue>, source: &JsonMap) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

fn array_of_objects(
    capability: &str,
    result: &JsonMap,
    key: &str,
) -> Result<Vec<JsonMap>, StageError> {
    match result.get(key) {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .cloned()
                    .ok_or_else(|| StageError::InvalidResult {
                        capability: capability.to_string(),
                        reason: format!("'{}' must hold objects", key),
                    })
            })
            .collect(),
        Some(_) => Err(StageError::InvalidResult {
            capability: capability.to_string(),
            reason: format!("'{}' must be an array", key),
        }),
    }
}

fn apply_intake(_results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    state.touch();
    Ok(())
}

fn apply_understand(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(data) = results
        .get("parse_request_text")
        .and_then(|r| object(r, "structured_data"))
    {
        merge_into(&mut state.extracted_entities, data);
    }
    if let Some(entities) = results
        .get("extract_entities")
        .and_then(|r| object(r, "entities"))
    {
        merge_into(&mut state.extracted_entities, entities);
    }
    Ok(())
}

fn apply_prepare(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(normalized) = results
        .get("normalize_fields")
        .and_then(|r| object(r, "normalized"))
    {
        merge_into(&mut state.normalized_fields, normalized);
    }
    if let Some(records) = results.get("enrich_records") {
        merge_into(&mut state.enrichment, records);
    }
    if let Some(flags) = results
        .get("add_flags_calculations")
        .and_then(|r| object(r, "flags"))
    {
        merge_into(&mut state.enrichment, flags);
    }
    Ok(())
}

fn apply_ask(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("clarify_question") {
        state.clarification_question = Some(text(result, "question").unwrap_or_default());
    }
    Ok(())
}

fn apply_wait(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("extract_answer") {
        state.human_response = Some(text(result, "answer").unwrap_or_default());
    }
    Ok(())
}

fn apply_retrieve(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("knowledge_base_search") {
        let hits = array_of_objects("knowledge_base_search", result, "results")?;
        state.knowledge_base_results.extend(hits);
    }
    Ok(())
}

fn apply_decide(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("solution_evaluation") {
        let solutions = array_of_objects("solution_evaluation", result, "solutions")?;
        for solution in &solutions {
            let label = text(solution, "solution");
            let score = solution.get("score").and_then(JsonValue::as_f64);
            match (label, score) {
                (Some(label), Some(score)) => {
                    state.solution_scores.insert(label, score);
                }
                _ => {
                    return Err(StageError::InvalidResult {
                        capability: "solution_evaluation".to_string(),
                        reason: "each solution needs a 'solution' label and numeric 'score'"
                            .to_string(),
                    })
                }
            }
        }

        let best_listed = solutions
            .iter()
            .filter_map(|s| s.get("score").and_then(JsonValue::as_f64))
            .fold(None, |best: Option<f64>, score| {
                Some(best.map_or(score, |b| b.max(score)))
            });
        let reported = result.get("best_score").and_then(JsonValue::as_f64);
        state.confidence_score = best_listed.or(reported).unwrap_or(0.0);
    }

    if let Some(result) = results.get("escalation_decision") {
        state.provider_verdict = Some(ProviderVerdict {
            escalate: result
                .get("escalate")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            reason: text(result, "reason"),
        });
    }
    Ok(())
}

fn apply_update(_results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if EscalationPolicy::new().permits_resolution(state) {
        state.status = TicketStatus::Resolved;
    }
    Ok(())
}

fn apply_create(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("response_generation") {
        state.generated_response = Some(text(result, "response").unwrap_or_default());
    }
    Ok(())
}

fn apply_do(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(result) = results.get("execute_api_calls") {
        if let Some(JsonValue::Array(calls)) = result.get("api_calls") {
            state.executed_actions.extend(calls.iter().cloned());
        }
    }
    if let Some(result) = results.get("trigger_notifications") {
        if let Some(JsonValue::Array(sent)) = result.get("notifications") {
            state.notifications.extend(sent.iter().cloned());
        }
    }
    Ok(())
}

fn apply_complete(results: &StageResults, state: &mut TicketState) -> Result<(), StageError> {
    if let Some(payload) = results
        .get("output_payload")
        .and_then(|r| object(r, "final_payload"))
    {
        state.final_payload = Some(payload.clone());
    }
    state.processing_complete = true;
    state.touch();
    Ok(())
}
