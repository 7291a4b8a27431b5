// ABOUTME: Error types for advice requests
// ABOUTME: Any of these fails the ASK or DECIDE stage that asked for advice

use thiserror::Error;

use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum AdviceError {
    #[error("Advice request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Advice backend answered with status {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Advice backend returned no text")]
    EmptyReply,

    #[error("Advice backend unavailable: {0}")]
    Unavailable(String),

    #[error("Advice prompt could not be rendered: {0}")]
    Prompt(#[from] TemplateError),

    #[error("Invalid advice configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AdviceError>;
