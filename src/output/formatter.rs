// ABOUTME: Output formatters for output records (JSON, YAML, text)
// ABOUTME: Applies output options before serializing a single record or a batch

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::config::{OutputConfig, OutputOptions};
use super::error::{OutputError, Result};
use crate::engine::{OutputRecord, TicketStatus};

#[async_trait]
pub trait OutputFormatter: Send + Sync {
    async fn format_records(&self, records: &[OutputRecord], config: &OutputConfig)
        -> Result<String>;

    /// Extension for files holding this format
    fn file_extension(&self) -> &'static str;
}

pub struct JsonFormatter {
    pretty: bool,
}

pub struct YamlFormatter;

pub struct TextFormatter;

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }
}

/// Records kept by the `only_degraded` option, in input order
pub fn selected<'a>(records: &'a [OutputRecord], options: &OutputOptions) -> Vec<&'a OutputRecord> {
    records
        .iter()
        .filter(|record| !options.only_degraded || record.is_degraded())
        .collect()
}

fn truncate(text: &str, max_len: Option<usize>) -> String {
    match max_len {
        Some(max_len) if text.chars().count() > max_len => {
            let cut: String = text.chars().take(max_len).collect();
            format!("{}... [truncated]", cut)
        }
        _ => text.to_string(),
    }
}

/// Record as a JSON value with the options applied
pub fn prepare_record(record: &OutputRecord, options: &OutputOptions) -> Result<JsonValue> {
    let mut value = serde_json::to_value(record)?;

    if let Some(map) = value.as_object_mut() {
        if !options.include_stage_logs {
            map.remove("stage_logs");
        }
        if !options.include_payload {
            map.remove("final_payload");
        }
        if let Some(response) = &record.response {
            map.insert(
                "response".to_string(),
                JsonValue::String(truncate(response, options.max_response_length)),
            );
        }
    }

    Ok(value)
}

/// One record renders as an object, anything else as an array
fn prepare_records(records: &[OutputRecord], options: &OutputOptions) -> Result<JsonValue> {
    let mut prepared = selected(records, options)
        .into_iter()
        .map(|record| prepare_record(record, options))
        .collect::<Result<Vec<_>>>()?;

    if records.len() == 1 && prepared.len() == 1 {
        Ok(prepared.remove(0))
    } else {
        Ok(JsonValue::Array(prepared))
    }
}

#[async_trait]
impl OutputFormatter for JsonFormatter {
    async fn format_records(
        &self,
        records: &[OutputRecord],
        config: &OutputConfig,
    ) -> Result<String> {
        let value = prepare_records(records, &config.options)?;

        if self.pretty || config.options.pretty_print {
            serde_json::to_string_pretty(&value).map_err(OutputError::Json)
        } else {
            serde_json::to_string(&value).map_err(OutputError::Json)
        }
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

impl Default for YamlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl YamlFormatter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OutputFormatter for YamlFormatter {
    async fn format_records(
        &self,
        records: &[OutputRecord],
        config: &OutputConfig,
    ) -> Result<String> {
        let value = prepare_records(records, &config.options)?;
        serde_yaml::to_string(&value).map_err(OutputError::Yaml)
    }

    fn file_extension(&self) -> &'static str {
        "yaml"
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    fn format_record(&self, record: &OutputRecord, options: &OutputOptions) -> String {
        let status_icon = match record.status {
            TicketStatus::Resolved => "✓",
            TicketStatus::Escalated => "⇑",
            TicketStatus::Closed => "⊘",
            TicketStatus::Pending => "⧖",
        };

        let mut output = format!(
            "{} {} [{}] confidence {} ({:.2}s)",
            status_icon,
            record.ticket_id,
            record.status,
            crate::engine::escalation::format_score(record.confidence_score),
            record.processing_time
        );
        if record.cancelled {
            output.push_str(" (cancelled)");
        }

        if let Some(reason) = &record.escalation_reason {
            output.push_str(&format!("\n  Escalation: {}", reason));
        }
        if let Some(response) = &record.response {
            let response = truncate(response, options.max_response_length);
            output.push_str(&format!(
                "\n  Response: {}",
                response.replace('\n', "\n            ")
            ));
        }

        if options.include_stage_logs {
            output.push_str("\n  Stages:");
            for log in &record.stage_logs {
                let icon = if log.succeeded { "✓" } else { "✗" };
                output.push_str(&format!(
                    "\n    {} {:>2} {:<10} {} abilities",
                    icon,
                    log.stage_index,
                    log.stage_name,
                    log.executions.len()
                ));
                if let Some(error) = &log.error {
                    output.push_str(&format!("\n         Error: {}", error));
                }
            }
        }

        output
    }
}

#[async_trait]
impl OutputFormatter for TextFormatter {
    async fn format_records(
        &self,
        records: &[OutputRecord],
        config: &OutputConfig,
    ) -> Result<String> {
        let selected = selected(records, &config.options);
        let mut output = selected
            .iter()
            .map(|record| self.format_record(record, &config.options))
            .collect::<Vec<_>>()
            .join("\n\n");

        if records.len() > 1 {
            let resolved = records
                .iter()
                .filter(|r| r.status == TicketStatus::Resolved)
                .count();
            let escalated = records
                .iter()
                .filter(|r| r.status == TicketStatus::Escalated)
                .count();
            let degraded = records.iter().filter(|r| r.is_degraded()).count();
            output.push_str(&format!(
                "\n\nSummary: {} tickets, {} resolved, {} escalated, {} degraded",
                records.len(),
                resolved,
                escalated,
                degraded
            ));
        }

        Ok(output)
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}
