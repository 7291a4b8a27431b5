// ABOUTME: Built-in provider for state-local abilities
// ABOUTME: Acknowledges intake and storage steps and emits the final payload snapshot

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{not_found_result, AbilityProvider, Result, INTERNAL_PROVIDER};
use crate::JsonMap;

pub const INTERNAL_ABILITIES: [&str; 5] = [
    "accept_payload",
    "store_answer",
    "store_data",
    "update_payload",
    "output_payload",
];

#[derive(Debug, Default)]
pub struct InternalProvider;

impl InternalProvider {
    pub fn new() -> Self {
        Self
    }
}

fn status(value: &str) -> JsonMap {
    let mut result = JsonMap::new();
    result.insert("status".to_string(), value.into());
    result
}

#[async_trait]
impl AbilityProvider for InternalProvider {
    fn provider_id(&self) -> &str {
        INTERNAL_PROVIDER
    }

    async fn execute(&self, capability: &str, payload: &JsonMap) -> Result<JsonMap> {
        let result = match capability {
            "accept_payload" => {
                let mut result = status("payload_accepted");
                result.insert(
                    "ticket_id".to_string(),
                    payload.get("ticket_id").cloned().unwrap_or(JsonValue::Null),
                );
                result
            }
            "store_answer" => status("answer_stored"),
            "store_data" => status("data_stored"),
            "update_payload" => status("payload_updated"),
            "output_payload" => {
                let mut snapshot = payload.clone();
                snapshot.remove("stage_results");
                let mut result = status("payload_output");
                result.insert("final_payload".to_string(), JsonValue::Object(snapshot));
                result
            }
            _ => not_found_result(),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::is_not_found;
    use serde_json::json;

    fn payload() -> JsonMap {
        json!({"ticket_id": "T-9", "status": "pending", "stage_results": {"x": {}}})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_accept_payload_echoes_ticket() {
        let provider = InternalProvider::new();
        let result = provider.execute("accept_payload", &payload()).await.unwrap();
        assert_eq!(result["status"], "payload_accepted");
        assert_eq!(result["ticket_id"], "T-9");
    }

    #[tokio::test]
    async fn test_acknowledgements() {
        let provider = InternalProvider::new();
        for (capability, expected) in [
            ("store_answer", "answer_stored"),
            ("store_data", "data_stored"),
            ("update_payload", "payload_updated"),
        ] {
            let result = provider.execute(capability, &payload()).await.unwrap();
            assert_eq!(result["status"], expected);
        }
    }

    #[tokio::test]
    async fn test_output_payload_drops_stage_results() {
        let provider = InternalProvider::new();
        let result = provider.execute("output_payload", &payload()).await.unwrap();
        assert_eq!(result["final_payload"]["ticket_id"], "T-9");
        assert!(result["final_payload"].get("stage_results").is_none());
    }

    #[tokio::test]
    async fn test_unknown_internal_ability() {
        let provider = InternalProvider::new();
        let result = provider.execute("teleport", &payload()).await.unwrap();
        assert!(is_not_found(&result));
    }
}
