// ABOUTME: Record writers: stdout, a single batch file, or one file per ticket
// ABOUTME: Writers receive the rendered batch plus the records so they can re-render per ticket

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::config::{
    FileWriterConfig, OutputConfig, OutputDestination, StdoutWriterConfig, TicketDirConfig,
};
use super::error::{OutputError, Result};
use super::formatter::{selected, OutputFormatter};
use crate::engine::OutputRecord;

/// A batch of records on its way to a destination, already rendered once as a whole
pub struct RecordBatch<'a> {
    pub records: &'a [OutputRecord],
    pub rendered: &'a str,
    pub formatter: &'a dyn OutputFormatter,
    pub config: &'a OutputConfig,
}

impl RecordBatch<'_> {
    /// Records the output options keep
    pub fn selected(&self) -> Vec<&OutputRecord> {
        selected(self.records, &self.config.options)
    }

    /// Render one record on its own, in the batch's format
    pub async fn render_one(&self, record: &OutputRecord) -> Result<String> {
        self.formatter
            .format_records(std::slice::from_ref(record), self.config)
            .await
    }
}

#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Write the batch; returns how many records reached the destination
    async fn write(&self, batch: &RecordBatch<'_>, destination: &OutputDestination)
        -> Result<usize>;
}

pub struct StdoutWriter;

/// Writes the whole batch to one file
pub struct FileWriter;

/// Writes each ticket's record to `<dir>/<ticket_id>.<ext>`
pub struct TicketDirWriter;

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordWriter for StdoutWriter {
    async fn write(
        &self,
        batch: &RecordBatch<'_>,
        destination: &OutputDestination,
    ) -> Result<usize> {
        let config: StdoutWriterConfig = destination.get_config()?;
        if !config.quiet {
            println!("{}", batch.rendered);
        }

        let count = batch.selected().len();
        debug!("Wrote {} records to stdout", count);
        Ok(count)
    }
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordWriter for FileWriter {
    async fn write(
        &self,
        batch: &RecordBatch<'_>,
        destination: &OutputDestination,
    ) -> Result<usize> {
        let config: FileWriterConfig = destination.get_config()?;
        let path = PathBuf::from(&config.path);

        if config.create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir(parent).await?;
            }
        }

        if config.append {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(io_error(&path))?;
            file.write_all(batch.rendered.as_bytes())
                .await
                .map_err(io_error(&path))?;
            file.write_all(b"\n").await.map_err(io_error(&path))?;
        } else {
            fs::write(&path, batch.rendered)
                .await
                .map_err(io_error(&path))?;
        }

        let count = batch.selected().len();
        info!("Wrote {} records to {}", count, path.display());
        Ok(count)
    }
}

impl Default for TicketDirWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketDirWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RecordWriter for TicketDirWriter {
    async fn write(
        &self,
        batch: &RecordBatch<'_>,
        destination: &OutputDestination,
    ) -> Result<usize> {
        let config: TicketDirConfig = destination.get_config()?;
        let dir = PathBuf::from(&config.dir);
        if config.create_dirs {
            create_dir(&dir).await?;
        }

        let extension = batch.formatter.file_extension();
        let records = batch.selected();
        for record in &records {
            let path = dir.join(ticket_file_name(&record.ticket_id, extension)?);
            let content = batch.render_one(record).await?;
            fs::write(&path, content).await.map_err(io_error(&path))?;
            debug!("Wrote record for {} to {}", record.ticket_id, path.display());
        }

        info!("Wrote {} ticket records into {}", records.len(), dir.display());
        Ok(records.len())
    }
}

/// File name for a ticket's record; anything outside `[A-Za-z0-9._-]` becomes `_`
pub fn ticket_file_name(ticket_id: &str, extension: &str) -> Result<String> {
    let stem: String = ticket_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Leading dots would make hidden files or `..`
    let stem = stem.trim_start_matches('.');
    if stem.trim_matches('_').is_empty() {
        return Err(OutputError::UnusableTicketId {
            ticket_id: ticket_id.to_string(),
        });
    }
    Ok(format!("{}.{}", stem, extension))
}

async fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).await.map_err(io_error(dir))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TicketStatus;
    use crate::output::formatter::{JsonFormatter, TextFormatter};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> OutputRecord {
        OutputRecord {
            ticket_id: id.to_string(),
            status: TicketStatus::Resolved,
            response: Some("Done".to_string()),
            confidence_score: 92.0,
            escalation_reason: None,
            stage_logs: Vec::new(),
            processing_time: 0.1,
            completion_time: Utc::now(),
            agent_name: "Langie".to_string(),
            agent_version: "1.0.0".to_string(),
            final_payload: None,
            cancelled: false,
        }
    }

    async fn write_with(
        writer: &dyn RecordWriter,
        formatter: &dyn OutputFormatter,
        records: &[OutputRecord],
        destination: &OutputDestination,
    ) -> Result<usize> {
        let config = OutputConfig::default();
        let rendered = formatter.format_records(records, &config).await?;
        let batch = RecordBatch {
            records,
            rendered: &rendered,
            formatter,
            config: &config,
        };
        writer.write(&batch, destination).await
    }

    #[tokio::test]
    async fn test_ticket_dir_writer_writes_one_file_per_ticket() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("records");
        let destination = OutputDestination::new_ticket_dir(dir.to_string_lossy());
        let records = vec![record("T-1"), record("T-2")];

        let written = write_with(
            &TicketDirWriter::new(),
            &JsonFormatter::new(),
            &records,
            &destination,
        )
        .await
        .unwrap();
        assert_eq!(written, 2);

        for id in ["T-1", "T-2"] {
            let content = std::fs::read_to_string(dir.join(format!("{}.json", id))).unwrap();
            let value: serde_json::Value = serde_json::from_str(&content).unwrap();
            assert_eq!(value["ticket_id"], id);
        }
    }

    #[tokio::test]
    async fn test_ticket_dir_writer_uses_format_extension() {
        let temp_dir = TempDir::new().unwrap();
        let destination = OutputDestination::new_ticket_dir(temp_dir.path().to_string_lossy());

        write_with(
            &TicketDirWriter::new(),
            &TextFormatter::new(),
            &[record("T-9")],
            &destination,
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("T-9.txt")).unwrap();
        assert!(content.contains("T-9 [resolved]"));
    }

    #[tokio::test]
    async fn test_file_writer_appends_batches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/records.jsonl");
        let mut destination = OutputDestination::new_file(path.to_string_lossy());
        destination
            .config
            .insert("append".to_string(), serde_yaml::Value::Bool(true));

        let writer = FileWriter::new();
        let formatter = JsonFormatter::new();
        write_with(&writer, &formatter, &[record("T-1")], &destination)
            .await
            .unwrap();
        write_with(&writer, &formatter, &[record("T-2")], &destination)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"T-1\""));
        assert!(lines[1].contains("\"T-2\""));
    }

    #[tokio::test]
    async fn test_destinations_require_their_settings() {
        let file = OutputDestination {
            writer_type: "file".to_string(),
            config: Default::default(),
        };
        let err = write_with(&FileWriter::new(), &JsonFormatter::new(), &[], &file)
            .await
            .unwrap_err();
        assert!(matches!(err, OutputError::InvalidDestination { .. }));

        let tickets = OutputDestination {
            writer_type: "tickets".to_string(),
            config: Default::default(),
        };
        let err = write_with(&TicketDirWriter::new(), &JsonFormatter::new(), &[], &tickets)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid tickets destination"));
    }

    #[tokio::test]
    async fn test_stdout_writer_counts_records() {
        let mut destination = OutputDestination::new_stdout();
        destination
            .config
            .insert("quiet".to_string(), serde_yaml::Value::Bool(true));

        let written = write_with(
            &StdoutWriter::new(),
            &JsonFormatter::new(),
            &[record("T-1"), record("T-2")],
            &destination,
        )
        .await
        .unwrap();
        assert_eq!(written, 2);
    }

    #[test]
    fn test_ticket_file_name() {
        assert_eq!(ticket_file_name("TICKET-1a2b", "json").unwrap(), "TICKET-1a2b.json");
        assert_eq!(ticket_file_name("../etc/passwd", "yaml").unwrap(), "_etc_passwd.yaml");
        assert_eq!(ticket_file_name("a b/c", "txt").unwrap(), "a_b_c.txt");
        assert!(matches!(
            ticket_file_name("..", "json"),
            Err(OutputError::UnusableTicketId { .. })
        ));
        assert!(ticket_file_name("//", "json").is_err());
    }
}
