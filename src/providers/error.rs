// ABOUTME: Error types for ability providers and the provider registry
// ABOUTME: These never escape the registry; they are rendered into ability execution records

use std::time::Duration;
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Unknown server: {provider_id}")]
    UnknownProvider { provider_id: String },

    #[error("Provider already registered: {provider_id}")]
    DuplicateProvider { provider_id: String },

    #[error("Ability '{capability}' on {provider_id} timed out after {timeout:?}")]
    Timeout {
        provider_id: String,
        capability: String,
        timeout: Duration,
    },

    #[error("Ability '{capability}' on {provider_id} panicked: {message}")]
    Panicked {
        provider_id: String,
        capability: String,
        message: String,
    },

    #[error("Provider {provider_id} is closed")]
    Closed { provider_id: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider {provider_id} answered with status {status}: {body}")]
    Status {
        provider_id: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response for '{capability}': {reason}")]
    MalformedResponse { capability: String, reason: String },

    #[error("Ability '{capability}' failed: {message}")]
    Failed { capability: String, message: String },

    #[error("Canned response could not be rendered: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid provider configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
