// ABOUTME: Offline advisor answering from simple ticket rules
// ABOUTME: Asks for clarification on low and medium priority tickets only

use async_trait::async_trait;

use super::{AdviceKind, AdviceRequest, Advisor, Result};
use crate::engine::Priority;

#[derive(Debug, Default)]
pub struct RulesAdvisor;

impl RulesAdvisor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Advisor for RulesAdvisor {
    fn name(&self) -> &str {
        "rules"
    }

    async fn advise(&self, request: &AdviceRequest) -> Result<String> {
        let reply = match request.kind {
            AdviceKind::Clarification => match request.priority {
                Priority::Low | Priority::Medium => {
                    "YES - lower priority tickets get a clarifying question before we act."
                        .to_string()
                }
                Priority::High | Priority::Critical => {
                    "NO - the request is urgent, proceed with the information at hand.".to_string()
                }
            },
            AdviceKind::Decision => match request.kb_result_count {
                0 => "No knowledge base articles matched; rely on solution scoring.".to_string(),
                n => format!(
                    "Found {} relevant knowledge base articles; prefer the highest scoring documented fix.",
                    n
                ),
            },
        };
        Ok(reply)
    }
}
