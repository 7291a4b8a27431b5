// ABOUTME: Canned response catalogs for the simulated ATLAS and COMMON servers
// ABOUTME: String leaves are handlebars templates resolved against the ability payload

use indexmap::IndexMap;
use serde_json::{json, Value as JsonValue};

use crate::engine::stage::{ATLAS, COMMON};

pub type Catalog = IndexMap<String, JsonValue>;

const RESPONSE_TEMPLATE: &str = "Dear {{default customer_name \"Customer\"}},

Thank you for contacting our support team regarding your login issue.

I understand you're having trouble accessing your account due to password authentication issues. Based on our investigation, I've taken the following steps to resolve this:

1. Unlocked your account (it appears to have been temporarily locked due to multiple failed login attempts)
2. Sent a new password reset email to your registered address
3. Verified that our email system is functioning properly

Please check your inbox (and spam folder) for the password reset email. If you don't receive it within 10 minutes, please reply to this ticket and we'll explore alternative solutions.

For immediate assistance with urgent transactions, you can also call our priority support line at 1-800-SUPPORT.

Best regards,
Langie - Customer Support Agent
Ticket ID: {{default ticket_id \"Unknown\"}}";

pub fn atlas_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.insert(
        "extract_entities".to_string(),
        json!({
            "entities": {
                "product": "User Account",
                "issue_type": "Authentication",
                "urgency": "High",
                "account_id": "user_12345"
            }
        }),
    );
    catalog.insert(
        "enrich_records".to_string(),
        json!({
            "sla_info": {"response_time": "2 hours", "resolution_time": "24 hours"},
            "historical_tickets": [
                {"ticket_id": "T-001", "issue": "Password reset", "resolved": true},
                {"ticket_id": "T-002", "issue": "Account locked", "resolved": true}
            ]
        }),
    );
    catalog.insert(
        "clarify_question".to_string(),
        json!({
            "question": "Have you tried using the 'Forgot Password' feature on the login page?"
        }),
    );
    catalog.insert(
        "extract_answer".to_string(),
        json!({
            "answer": "Yes, I tried the forgot password feature but I'm not receiving the reset email."
        }),
    );
    catalog.insert(
        "knowledge_base_search".to_string(),
        json!({
            "results": [
                {
                    "title": "Email delivery issues",
                    "content": "Check spam folder, verify email address, contact support if no email received within 10 minutes",
                    "relevance": 0.95
                },
                {
                    "title": "Password reset troubleshooting",
                    "content": "Common issues include blocked emails, incorrect email address, or account lockout",
                    "relevance": 0.89
                }
            ]
        }),
    );
    catalog.insert(
        "escalation_decision".to_string(),
        json!({"escalate": false, "reason": "Standard troubleshooting available"}),
    );
    catalog.insert(
        "update_ticket".to_string(),
        json!({"ticket_updated": true, "new_status": "In Progress"}),
    );
    catalog.insert(
        "close_ticket".to_string(),
        json!({"ticket_closed": true, "closure_reason": "Resolved"}),
    );
    catalog.insert(
        "execute_api_calls".to_string(),
        json!({
            "api_calls": [
                {"api": "reset_password_email", "status": "triggered", "response": "Email sent"},
                {"api": "unlock_account", "status": "success", "response": "Account unlocked"}
            ]
        }),
    );
    catalog.insert(
        "trigger_notifications".to_string(),
        json!({
            "notifications": [
                {"type": "email", "recipient": "{{email}}", "status": "sent"}
            ]
        }),
    );
    catalog
}

pub fn common_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.insert(
        "parse_request_text".to_string(),
        json!({
            "structured_data": {
                "issue_category": "Authentication",
                "priority_level": "High",
                "keywords": ["login", "password", "incorrect", "urgent", "transaction"],
                "sentiment": "frustrated"
            }
        }),
    );
    catalog.insert(
        "normalize_fields".to_string(),
        json!({
            "normalized": {
                "email": "{{normalize email}}",
                "priority": "{{upper priority}}",
                "timestamp": "{{timestamp}}"
            }
        }),
    );
    catalog.insert(
        "add_flags_calculations".to_string(),
        json!({
            "flags": {"high_priority": true, "sla_risk": false, "escalation_score": 25}
        }),
    );
    catalog.insert(
        "solution_evaluation".to_string(),
        json!({
            "solutions": [
                {"solution": "Send password reset email", "score": 85},
                {"solution": "Unlock account manually", "score": 92},
                {"solution": "Escalate to security team", "score": 40}
            ],
            "best_score": 92
        }),
    );
    catalog.insert(
        "response_generation".to_string(),
        json!({"response": RESPONSE_TEMPLATE}),
    );
    catalog
}

/// Catalog for one of the well-known simulated servers
pub fn catalog_for(provider_id: &str) -> Option<Catalog> {
    match provider_id {
        ATLAS => Some(atlas_catalog()),
        COMMON => Some(common_catalog()),
        _ => None,
    }
}

/// A `solution_evaluation` result whose best score is `best`
pub fn solution_evaluation_with_best(best: f64) -> JsonValue {
    json!({
        "solutions": [
            {"solution": "Send password reset email", "score": (best - 7.0).max(0.0)},
            {"solution": "Unlock account manually", "score": best}
        ],
        "best_score": best
    })
}
