// ABOUTME: Output handler module for formatting and persisting output records
// ABOUTME: Renders the batch once with the named formatter, then hands it to every configured writer

pub mod config;
pub mod error;
pub mod formatter;
pub mod writer;

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use self::config::OutputConfig;
use self::error::{OutputError, Result};
use self::formatter::{JsonFormatter, OutputFormatter, TextFormatter, YamlFormatter};
use self::writer::{FileWriter, RecordBatch, RecordWriter, StdoutWriter, TicketDirWriter};
use crate::engine::OutputRecord;

pub struct OutputHandler {
    formatters: HashMap<String, Box<dyn OutputFormatter>>,
    writers: HashMap<String, Box<dyn RecordWriter>>,
}

#[async_trait]
pub trait OutputProcessor: Send + Sync {
    async fn process_record(&self, record: &OutputRecord, config: &OutputConfig) -> Result<()>;

    async fn process_records(&self, records: &[OutputRecord], config: &OutputConfig)
        -> Result<()>;
}

impl OutputHandler {
    pub fn new() -> Self {
        let mut handler = Self {
            formatters: HashMap::new(),
            writers: HashMap::new(),
        };

        handler.register_formatter("json", Box::new(JsonFormatter::new()));
        handler.register_formatter("pretty", Box::new(JsonFormatter::new_pretty()));
        handler.register_formatter("yaml", Box::new(YamlFormatter::new()));
        handler.register_formatter("text", Box::new(TextFormatter::new()));

        handler.register_writer("stdout", Box::new(StdoutWriter::new()));
        handler.register_writer("file", Box::new(FileWriter::new()));
        handler.register_writer("tickets", Box::new(TicketDirWriter::new()));

        handler
    }

    pub fn register_formatter(&mut self, name: &str, formatter: Box<dyn OutputFormatter>) {
        self.formatters.insert(name.to_string(), formatter);
    }

    pub fn register_writer(&mut self, name: &str, writer: Box<dyn RecordWriter>) {
        self.writers.insert(name.to_string(), writer);
    }

    /// Render the records once and write them to every destination
    pub async fn output_records(
        &self,
        records: &[OutputRecord],
        config: &OutputConfig,
    ) -> Result<()> {
        let formatter =
            self.formatters
                .get(&config.format)
                .ok_or_else(|| OutputError::UnknownFormat {
                    format: config.format.clone(),
                })?;

        // Resolve every writer before writing anything
        let writers = config
            .destinations
            .iter()
            .map(|destination| {
                self.writers
                    .get(&destination.writer_type)
                    .map(|writer| (writer, destination))
                    .ok_or_else(|| OutputError::UnknownDestination {
                        writer_type: destination.writer_type.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let rendered = formatter.format_records(records, config).await?;
        let batch = RecordBatch {
            records,
            rendered: &rendered,
            formatter: &**formatter,
            config,
        };

        for (writer, destination) in writers {
            let written = writer.write(&batch, destination).await?;
            debug!("{} destination took {} records", destination.writer_type, written);
        }

        Ok(())
    }

    pub fn list_formatters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn list_writers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.writers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl OutputProcessor for OutputHandler {
    async fn process_record(&self, record: &OutputRecord, config: &OutputConfig) -> Result<()> {
        self.output_records(std::slice::from_ref(record), config)
            .await
    }

    async fn process_records(
        &self,
        records: &[OutputRecord],
        config: &OutputConfig,
    ) -> Result<()> {
        self.output_records(records, config).await
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::config::OutputDestination;
    use super::*;

    #[test]
    fn test_builtin_registrations() {
        let handler = OutputHandler::new();
        assert_eq!(
            handler.list_formatters(),
            vec!["json", "pretty", "text", "yaml"]
        );
        assert_eq!(handler.list_writers(), vec!["file", "stdout", "tickets"]);
    }

    #[tokio::test]
    async fn test_unknown_formatter_and_writer() {
        let handler = OutputHandler::new();

        let config = OutputConfig::default().with_format("xml");
        assert!(matches!(
            handler.output_records(&[], &config).await,
            Err(OutputError::UnknownFormat { .. })
        ));

        let mut config = OutputConfig::default();
        config.destinations = vec![OutputDestination {
            writer_type: "s3".to_string(),
            config: Default::default(),
        }];
        assert!(matches!(
            handler.output_records(&[], &config).await,
            Err(OutputError::UnknownDestination { .. })
        ));
    }

    #[tokio::test]
    async fn test_records_written_to_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");
        let config = OutputConfig::default()
            .with_format("json")
            .to_file(path.to_string_lossy());

        let handler = OutputHandler::new();
        handler.output_records(&[], &config).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[]");
    }

    #[tokio::test]
    async fn test_degraded_records_split_per_ticket() {
        use crate::engine::{StageId, StageLog, TicketStatus};

        let temp_dir = tempfile::TempDir::new().unwrap();
        let record = |id: &str, failed: bool| {
            let mut retrieve = StageLog::open(StageId::Retrieve);
            retrieve.close(failed.then(|| "knowledge base offline".to_string()));
            OutputRecord {
                ticket_id: id.to_string(),
                status: TicketStatus::Resolved,
                response: None,
                confidence_score: 92.0,
                escalation_reason: None,
                stage_logs: vec![retrieve],
                processing_time: 0.2,
                completion_time: chrono::Utc::now(),
                agent_name: "Langie".to_string(),
                agent_version: "1.0.0".to_string(),
                final_payload: None,
                cancelled: false,
            }
        };
        let records = vec![record("T-OK", false), record("T-BAD", true)];

        let mut config = OutputConfig::default()
            .with_format("yaml")
            .to_ticket_dir(temp_dir.path().to_string_lossy());
        config.options.only_degraded = true;

        OutputHandler::new()
            .process_records(&records, &config)
            .await
            .unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("T-BAD.yaml")).unwrap();
        assert!(written.contains("ticket_id: T-BAD"));
        assert!(!temp_dir.path().join("T-OK.yaml").exists());
    }
}
