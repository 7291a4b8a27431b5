// ABOUTME: Integration tests for the workflow engine
// ABOUTME: Covers the resolve, escalate, and degraded paths plus teardown, cancellation, and batching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ticketflow::advice::{AdviceKind, ScriptedAdvisor};
use ticketflow::engine::stage::{ATLAS, COMMON};
use ticketflow::engine::{
    EngineError, Priority, StageCatalog, StageId, TicketStatus, ESCALATION_THRESHOLD,
};
use ticketflow::providers::catalog::solution_evaluation_with_best;
use ticketflow::providers::{is_not_found, ProviderRegistry, SimulatedProvider};

mod common;
use common::{login_ticket, ticket, TestEngineBuilder};

fn stage_names(record: &ticketflow::OutputRecord) -> Vec<&str> {
    record
        .stage_logs
        .iter()
        .map(|log| log.stage_name.as_str())
        .collect()
}

#[tokio::test]
async fn test_high_confidence_ticket_with_clarification_resolves() {
    let test = TestEngineBuilder::new()
        .with_advisor(ScriptedAdvisor::new("YES", "Reset the password."))
        .build();

    let record = test.engine.process(login_ticket("T-A")).await.unwrap();

    assert_eq!(record.ticket_id, "T-A");
    assert_eq!(record.status, TicketStatus::Resolved);
    assert_eq!(record.confidence_score, 92.0);
    assert!(record.escalation_reason.is_none());
    assert!(!record.cancelled);
    assert!(!record.is_degraded());
    assert!(record
        .response
        .as_deref()
        .map(|r| !r.trim().is_empty())
        .unwrap_or(false));

    assert_eq!(
        stage_names(&record),
        vec![
            "INTAKE",
            "UNDERSTAND",
            "PREPARE",
            "ASK",
            "WAIT",
            "RETRIEVE",
            "DECIDE",
            "UPDATE",
            "CREATE",
            "DO",
            "COMPLETE"
        ]
    );
    assert_eq!(record.agent_name, "Langie");
    assert_eq!(record.agent_version, "1.0.0");
    assert!(record.final_payload.is_some());
}

#[tokio::test]
async fn test_low_confidence_ticket_escalates_and_skips_resolution_stages() {
    let test = TestEngineBuilder::new()
        .with_response(COMMON, "solution_evaluation", solution_evaluation_with_best(40.0))
        .build();

    let record = test.engine.process(login_ticket("T-B")).await.unwrap();

    assert_eq!(record.status, TicketStatus::Escalated);
    assert_eq!(record.confidence_score, 40.0);
    assert_eq!(
        record.escalation_reason.as_deref(),
        Some("Low confidence score: 40")
    );
    assert!(record.response.is_none());

    assert_eq!(
        stage_names(&record),
        vec!["INTAKE", "UNDERSTAND", "PREPARE", "ASK", "RETRIEVE", "DECIDE", "COMPLETE"]
    );
    for stage in [StageId::Update, StageId::Create, StageId::Do] {
        assert!(!record.ran_stage(stage), "{} should not run", stage);
    }
}

#[tokio::test]
async fn test_provider_escalation_verdict_is_kept_above_threshold() {
    let test = TestEngineBuilder::new()
        .with_response(
            ATLAS,
            "escalation_decision",
            serde_json::json!({"escalate": true, "reason": "Fraud suspected"}),
        )
        .build();

    let record = test.engine.process(login_ticket("T-V")).await.unwrap();

    assert!(record.confidence_score >= ESCALATION_THRESHOLD);
    assert_eq!(record.status, TicketStatus::Escalated);
    assert_eq!(record.escalation_reason.as_deref(), Some("Fraud suspected"));
}

#[tokio::test]
async fn test_failed_retrieval_degrades_but_run_continues() {
    let test = TestEngineBuilder::new()
        .with_failure(ATLAS, "knowledge_base_search", "knowledge base offline")
        .build();

    let record = test.engine.process(login_ticket("T-C")).await.unwrap();

    let retrieve = record.stage_log(StageId::Retrieve).unwrap();
    assert!(!retrieve.succeeded);
    assert!(retrieve
        .error
        .as_deref()
        .unwrap()
        .contains("knowledge base offline"));
    assert_eq!(retrieve.executions.len(), 1);
    assert!(!retrieve.executions[0].is_success());

    let decide = record.stage_log(StageId::Decide).unwrap();
    assert!(decide.succeeded);

    assert!(record.is_degraded());
    assert_eq!(record.failed_stages().len(), 1);
    assert_eq!(record.status, TicketStatus::Resolved);
    assert!(record.ran_stage(StageId::Complete));
}

#[tokio::test]
async fn test_decide_advice_failure_still_enforces_escalation() {
    let test = TestEngineBuilder::new()
        .with_advisor(ScriptedAdvisor::new("NO", "").failing(AdviceKind::Decision, "quota exceeded"))
        .build();

    let record = test.engine.process(login_ticket("T-D")).await.unwrap();

    let decide = record.stage_log(StageId::Decide).unwrap();
    assert!(!decide.succeeded);
    assert!(decide.executions.is_empty());
    assert_eq!(record.status, TicketStatus::Escalated);
    assert_eq!(
        record.escalation_reason.as_deref(),
        Some("Low confidence score: 0")
    );
}

#[tokio::test]
async fn test_registry_closed_once_per_run() {
    let test = TestEngineBuilder::new().build();

    test.engine.process(login_ticket("T-1")).await.unwrap();
    assert_eq!(test.registries_built(), 1);
    // ATLAS and COMMON each count their own close
    assert_eq!(test.close_count(), 2);

    test.engine.process(login_ticket("T-2")).await.unwrap();
    assert_eq!(test.registries_built(), 2);
    assert_eq!(test.close_count(), 4);
}

#[tokio::test]
async fn test_registry_closed_on_invalid_input() {
    let test = TestEngineBuilder::new().build();
    let mut input = login_ticket("T-BAD");
    input.query_text = "   ".to_string();

    let err = test.engine.process(input).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput { .. }));
    assert_eq!(test.close_count(), 2);
}

#[tokio::test]
async fn test_cancelled_engine_produces_partial_record_and_closes() {
    let test = TestEngineBuilder::new().build();
    test.engine.cancel();

    let record = test.engine.process(login_ticket("T-X")).await.unwrap();

    assert!(record.cancelled);
    assert_eq!(record.stage_logs.len(), 1);
    assert!(record.stage_logs[0]
        .error
        .as_deref()
        .unwrap()
        .contains("cancelled by caller"));
    assert_eq!(test.close_count(), 2);
}

#[tokio::test]
async fn test_run_timeout_cancels_in_flight_stage() {
    let test = TestEngineBuilder::new()
        .with_latency(Duration::from_millis(200))
        .with_run_timeout(Duration::from_millis(300))
        .build();

    let record = test.engine.process(login_ticket("T-SLOW")).await.unwrap();

    assert!(record.cancelled);
    assert!(record.stage_logs.len() < 11);
    let last = record.stage_logs.last().unwrap();
    assert!(!last.succeeded);
    assert!(last.error.as_deref().unwrap().contains("run timeout"));
    assert!(record.stage_logs.iter().all(|log| log.is_closed()));
    assert_eq!(test.close_count(), 2);
}

#[tokio::test]
async fn test_dropped_run_still_closes_providers() {
    let test = TestEngineBuilder::new()
        .with_latency(Duration::from_millis(200))
        .build();

    let outcome = tokio::time::timeout(
        Duration::from_millis(300),
        test.engine.process(login_ticket("T-DROP")),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(test.registries_built(), 1);
    assert_eq!(test.close_count(), 2);
}

#[tokio::test]
async fn test_issued_at_is_monotonic_within_a_run() {
    let test = TestEngineBuilder::new()
        .with_advisor(ScriptedAdvisor::new("YES", "ok"))
        .with_latency(Duration::from_millis(2))
        .build();

    let record = test.engine.process(login_ticket("T-ORD")).await.unwrap();

    let issued: Vec<_> = record
        .stage_logs
        .iter()
        .flat_map(|log| log.executions.iter().map(|e| e.issued_at))
        .collect();
    assert!(issued.len() > 10);
    assert!(issued.windows(2).all(|pair| pair[0] <= pair[1]));

    for log in &record.stage_logs {
        assert!(log.ended_at.unwrap() >= log.started_at);
    }
}

#[tokio::test]
async fn test_batch_keeps_input_order_and_isolates_runs() {
    let test = TestEngineBuilder::new()
        .with_max_concurrent(2)
        .with_latency(Duration::from_millis(5))
        .build();

    let mut bad = ticket("T-3", Priority::Low);
    bad.customer_name = String::new();
    let inputs = vec![
        ticket("T-1", Priority::High),
        ticket("T-2", Priority::Critical),
        bad,
        login_ticket("T-4"),
    ];

    let results = test.engine.process_batch(inputs).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().ticket_id, "T-1");
    assert_eq!(results[1].as_ref().unwrap().ticket_id, "T-2");
    assert!(results[2].is_err());
    assert_eq!(results[3].as_ref().unwrap().ticket_id, "T-4");

    assert_eq!(test.registries_built(), 4);
    assert_eq!(test.close_count(), 8);
}

#[tokio::test]
async fn test_ability_routes_rebind_capabilities() {
    let mut routes = HashMap::new();
    routes.insert("knowledge_base_search".to_string(), COMMON.to_string());

    let test = TestEngineBuilder::new().build();
    let engine = test
        .engine
        .with_catalog(StageCatalog::standard().with_routes(&routes));

    let record = engine.process(login_ticket("T-R")).await.unwrap();

    let retrieve = record.stage_log(StageId::Retrieve).unwrap();
    assert!(retrieve.succeeded);
    assert_eq!(retrieve.executions[0].provider_id, COMMON);
    assert!(is_not_found(retrieve.executions[0].result.as_ref().unwrap()));
}

#[tokio::test]
async fn test_unknown_capability_is_idempotent_not_found() {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(SimulatedProvider::new(ATLAS)))
        .unwrap();
    let payload = ticketflow::JsonMap::new();

    for provider_id in [ATLAS, "internal"] {
        let first = registry.execute(provider_id, "no_such_ability", &payload).await;
        let second = registry.execute(provider_id, "no_such_ability", &payload).await;

        assert!(first.is_success());
        assert_eq!(first.result, second.result);
        assert!(is_not_found(first.result.as_ref().unwrap()));
    }

    let unknown = registry.execute("MISSING", "anything", &payload).await;
    assert!(!unknown.is_success());
    assert_eq!(unknown.error.as_deref(), Some("Unknown server: MISSING"));
}
