// ABOUTME: Template module for advice prompts and canned provider responses
// ABOUTME: Wraps handlebars with ticket-aware helpers and a context built from ticket state

pub mod context;
pub mod engine;
pub mod error;
pub mod helpers;

pub use context::TemplateContext;
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
