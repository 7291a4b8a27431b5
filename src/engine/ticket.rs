// ABOUTME: Caller-supplied ticket records and the enums shared across a run
// ABOUTME: Handles ticket id generation, validation, and loading records from JSON or YAML

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Pending,
    Resolved,
    Escalated,
    Closed,
}

/// Immutable input for one workflow run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputRecord {
    pub customer_name: String,
    #[serde(alias = "email")]
    pub contact: String,
    #[serde(alias = "query")]
    pub query_text: String,
    pub priority: Priority,
    #[serde(default = "generate_ticket_id", alias = "ticket_id")]
    pub id: String,
}

/// Generate a ticket id in the `TICKET-YYYYMMDD-xxxxxxxx` shape
pub fn generate_ticket_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("TICKET-{}-{}", Utc::now().format("%Y%m%d"), &suffix[..8])
}

impl InputRecord {
    pub fn new(
        customer_name: impl Into<String>,
        contact: impl Into<String>,
        query_text: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            customer_name: customer_name.into(),
            contact: contact.into(),
            query_text: query_text.into(),
            priority,
            id: generate_ticket_id(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Reject records no stage can work with
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("id", &self.id),
            ("customer_name", &self.customer_name),
            ("contact", &self.contact),
            ("query_text", &self.query_text),
        ];

        for (field, value) in checks {
            if value.trim().is_empty() {
                return Err(EngineError::InvalidInput {
                    ticket_id: self.id.clone(),
                    reason: format!("{} cannot be empty", field),
                });
            }
        }

        Ok(())
    }

    /// Load one record or a list of records from a JSON or YAML file
    pub async fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<InputRecord>> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::InputFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::parse_all(&content).map_err(|message| EngineError::InputFile {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse one record or a list of records; JSON is a subset of YAML so one parser covers both
    pub fn parse_all(content: &str) -> std::result::Result<Vec<InputRecord>, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

        if value.is_sequence() {
            serde_yaml::from_value(value).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_value(value)
                .map(|record| vec![record])
                .map_err(|e| e.to_string())
        }
    }

    /// The login-trouble ticket used by the demo command
    pub fn sample() -> Self {
        Self::new(
            "John Smith",
            "john.smith@example.com",
            "I can't login to my account. It says my password is incorrect but I'm sure it's right. \
             This is urgent as I need to access my account for an important transaction.",
            Priority::High,
        )
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Pending => write!(f, "pending"),
            TicketStatus::Resolved => write!(f, "resolved"),
            TicketStatus::Escalated => write!(f, "escalated"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}
