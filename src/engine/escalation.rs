// ABOUTME: Confidence-based escalation policy applied after the DECIDE stage
// ABOUTME: The numeric threshold always wins over the provider's own escalation verdict

use serde::{Deserialize, Serialize};

use super::state::TicketState;
use super::ticket::TicketStatus;

/// Below this confidence a ticket is always escalated
pub const ESCALATION_THRESHOLD: f64 = 90.0;

/// What the escalation provider reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderVerdict {
    pub escalate: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EscalationDecision {
    Escalate {
        reason: String,
        /// Set when the threshold overrode the provider
        forced: bool,
    },
    Proceed,
}

impl EscalationDecision {
    pub fn is_escalation(&self) -> bool {
        matches!(self, EscalationDecision::Escalate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    threshold: f64,
}

impl EscalationPolicy {
    pub const fn new() -> Self {
        Self {
            threshold: ESCALATION_THRESHOLD,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pure decision from confidence and the provider verdict
    pub fn decide(&self, confidence: f64, verdict: Option<&ProviderVerdict>) -> EscalationDecision {
        // NaN fails this comparison too, so garbage scores escalate
        if !(confidence >= self.threshold) {
            let provider_agreed = verdict.map(|v| v.escalate).unwrap_or(false);
            return EscalationDecision::Escalate {
                reason: format!("Low confidence score: {}", format_score(confidence)),
                forced: !provider_agreed,
            };
        }

        match verdict {
            Some(verdict) if verdict.escalate => EscalationDecision::Escalate {
                reason: verdict
                    .reason
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "Escalation requested by provider".to_string()),
                forced: false,
            },
            _ => EscalationDecision::Proceed,
        }
    }

    /// Decide and write the escalation fields; status is only touched on escalation
    pub fn enforce(&self, state: &mut TicketState) -> EscalationDecision {
        let decision = self.decide(state.confidence_score, state.provider_verdict.as_ref());

        match &decision {
            EscalationDecision::Escalate { reason, .. } => {
                state.escalation_needed = true;
                state.escalation_reason = Some(reason.clone());
                state.status = TicketStatus::Escalated;
            }
            EscalationDecision::Proceed => {
                state.escalation_needed = false;
                state.escalation_reason = None;
            }
        }
        state.touch();

        decision
    }

    /// UPDATE may mark the ticket resolved only under this condition
    pub fn permits_resolution(&self, state: &TicketState) -> bool {
        state.confidence_score >= self.threshold && !state.escalation_needed
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Render whole scores without a trailing `.0`
pub fn format_score(score: f64) -> String {
    if score.is_finite() && score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}
