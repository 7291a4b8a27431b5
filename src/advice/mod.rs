// ABOUTME: Advice collaborator consulted by the ASK and DECIDE stages
// ABOUTME: Builds the two-message prompt from ticket state and defines the advisor backends

pub mod chat;
pub mod error;
pub mod rules;
pub mod scripted;

pub use chat::{ChatAdvisor, ChatConfig};
pub use error::{AdviceError, Result};
pub use rules::RulesAdvisor;
pub use scripted::ScriptedAdvisor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::{Priority, TicketState};
use crate::template::{TemplateContext, TemplateEngine};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AdviceKind {
    Clarification,
    Decision,
}

impl std::fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdviceKind::Clarification => write!(f, "clarification"),
            AdviceKind::Decision => write!(f, "decision"),
        }
    }
}

/// One advice exchange: a persona message and a context message
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceRequest {
    pub kind: AdviceKind,
    pub system_message: String,
    pub context_message: String,
    pub priority: Priority,
    pub kb_result_count: usize,
}

#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    /// Free-form reply text for the request
    async fn advise(&self, request: &AdviceRequest) -> Result<String>;
}

const CLARIFICATION_SYSTEM: &str = "You are {{agent}}, a structured customer support agent.";

const CLARIFICATION_CONTEXT: &str = "As {{agent}}, a customer support agent, analyze this ticket and determine if clarification is needed:

Customer: {{ticket.customer_name}}
Query: {{ticket.query_text}}
Priority: {{ticket.priority}}
Extracted entities: {{#each entities}}{{@key}}={{this}}{{#unless @last}}, {{/unless}}{{/each}}

Should we ask for clarification? Respond with 'YES' or 'NO' and explain why.";

const DECISION_SYSTEM: &str =
    "You are {{agent}}, making intelligent decisions about customer support resolution.";

const DECISION_CONTEXT: &str = "Current ticket analysis:
Customer: {{ticket.customer_name}}
Issue: {{ticket.query_text}}
Priority: {{ticket.priority}}
Entities: {{#each entities}}{{@key}}={{this}}{{#unless @last}}, {{/unless}}{{/each}}
KB Results: {{kb_result_count}} relevant articles found{{#if kb_titles}} ({{join \"; \" kb_titles}}){{/if}}

As {{agent}}, evaluate the situation and provide guidance on next steps.";

/// Renders advice prompts from ticket state
#[derive(Clone)]
pub struct PromptBuilder {
    agent_name: String,
    templates: TemplateEngine,
}

impl PromptBuilder {
    pub fn new(agent_name: &str) -> Result<Self> {
        let mut templates = TemplateEngine::new();
        templates.register_template("clarification.system", CLARIFICATION_SYSTEM)?;
        templates.register_template("clarification.context", CLARIFICATION_CONTEXT)?;
        templates.register_template("decision.system", DECISION_SYSTEM)?;
        templates.register_template("decision.context", DECISION_CONTEXT)?;

        Ok(Self {
            agent_name: agent_name.to_string(),
            templates,
        })
    }

    pub fn build(&self, kind: AdviceKind, state: &TicketState) -> Result<AdviceRequest> {
        let context = TemplateContext::for_ticket(state);
        let mut json = context.to_json()?;
        if let Some(map) = json.as_object_mut() {
            map.insert("agent".to_string(), self.agent_name.clone().into());
        }

        let system_message = self
            .templates
            .render_named_with_json(&format!("{}.system", kind), &json)?;
        let context_message = self
            .templates
            .render_named_with_json(&format!("{}.context", kind), &json)?;

        Ok(AdviceRequest {
            kind,
            system_message,
            context_message,
            priority: state.input().priority,
            kb_result_count: state.knowledge_base_results.len(),
        })
    }
}

/// True when the reply carries an affirmative `YES` token
pub fn is_affirmative(reply: &str) -> bool {
    reply
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InputRecord;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("YES - the query is vague"));
        assert!(is_affirmative("Answer: yes."));
        assert!(!is_affirmative("NO, everything we need is present"));
        assert!(!is_affirmative("The customer says eyes hurt"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_clarification_prompt() {
        let builder = PromptBuilder::new("Langie").unwrap();
        let mut state = TicketState::new(InputRecord::sample()).unwrap();
        state
            .extracted_entities
            .insert("product".to_string(), "User Account".into());

        let request = builder.build(AdviceKind::Clarification, &state).unwrap();
        assert_eq!(
            request.system_message,
            "You are Langie, a structured customer support agent."
        );
        assert!(request.context_message.contains("Customer: John Smith"));
        assert!(request.context_message.contains("Priority: HIGH"));
        assert!(request
            .context_message
            .contains("Extracted entities: product=User Account"));
        assert_eq!(request.priority, Priority::High);
    }

    #[test]
    fn test_decision_prompt_counts_kb_results() {
        let builder = PromptBuilder::new("Langie").unwrap();
        let mut state = TicketState::new(InputRecord::sample()).unwrap();
        let mut hit = crate::JsonMap::new();
        hit.insert("title".to_string(), "Email delivery issues".into());
        state.knowledge_base_results.push(hit);

        let request = builder.build(AdviceKind::Decision, &state).unwrap();
        assert!(request
            .context_message
            .contains("KB Results: 1 relevant articles found (Email delivery issues)"));
        assert_eq!(request.kb_result_count, 1);
    }
}
