// ABOUTME: Error types for template rendering
// ABOUTME: Covers handlebars syntax and render failures plus JSON conversion of rendered output

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template render error: {0}")]
    RenderError(#[from] handlebars::RenderError),

    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Rendered template is not valid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rendered template must be a JSON object, got: {0}")]
    NotAnObject(String),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
