// ABOUTME: Error types for rendering and persisting output records
// ABOUTME: Distinguishes unknown formats and destinations from serialization and filesystem failures

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Unknown output format: {format}")]
    UnknownFormat { format: String },

    #[error("Unknown output destination: {writer_type}")]
    UnknownDestination { writer_type: String },

    #[error("Invalid {writer_type} destination: {reason}")]
    InvalidDestination { writer_type: String, reason: String },

    #[error("Ticket id {ticket_id:?} cannot be used as a file name")]
    UnusableTicketId { ticket_id: String },

    #[error("Failed to write records to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize records as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize records as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;
