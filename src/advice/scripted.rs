// ABOUTME: Advisor with fixed replies per advice kind
// ABOUTME: Records every request it receives so callers can inspect the prompts

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{AdviceError, AdviceKind, AdviceRequest, Advisor, Result};

#[derive(Debug, Default)]
pub struct ScriptedAdvisor {
    replies: HashMap<AdviceKind, String>,
    failures: HashMap<AdviceKind, String>,
    requests: Mutex<Vec<AdviceRequest>>,
}

impl ScriptedAdvisor {
    pub fn new(clarification: &str, decision: &str) -> Self {
        let mut replies = HashMap::new();
        replies.insert(AdviceKind::Clarification, clarification.to_string());
        replies.insert(AdviceKind::Decision, decision.to_string());
        Self {
            replies,
            failures: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make requests of `kind` fail with `message`
    pub fn failing(mut self, kind: AdviceKind, message: &str) -> Self {
        self.failures.insert(kind, message.to_string());
        self
    }

    pub fn requests(&self) -> Vec<AdviceRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn advise(&self, request: &AdviceRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(message) = self.failures.get(&request.kind) {
            return Err(AdviceError::Unavailable(message.clone()));
        }

        self.replies
            .get(&request.kind)
            .cloned()
            .ok_or(AdviceError::EmptyReply)
    }
}
