// ABOUTME: Handlebars helper functions for prompt and canned-response rendering
// ABOUTME: String helpers are lenient: a missing or non-string parameter renders as empty text

use chrono::Utc;
use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};
use serde_json::Value as JsonValue;

fn str_param<'a>(h: &'a Helper, index: usize) -> &'a str {
    h.param(index)
        .and_then(|v| v.value().as_str())
        .unwrap_or("")
}

/// Timestamp helper - formats current time with optional format string
pub fn timestamp_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let now = Utc::now();
    let formatted = match h.param(0).and_then(|v| v.value().as_str()) {
        Some(format) => now.format(format).to_string(),
        None => now.to_rfc3339(),
    };
    out.write(&formatted)?;
    Ok(())
}

pub fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    out.write(&str_param(h, 0).to_uppercase())?;
    Ok(())
}

/// Lowercase and trim in one go, the shape contact addresses are compared in
pub fn normalize_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    out.write(&str_param(h, 0).trim().to_lowercase())?;
    Ok(())
}

/// Default helper - provides default value if variable is empty
pub fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let default_value = h
        .param(1)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| RenderError::new("default helper requires default value parameter"))?;

    let value = str_param(h, 0);
    out.write(if value.trim().is_empty() {
        default_value
    } else {
        value
    })?;
    Ok(())
}

/// Join helper - `{{join ", " items}}`; non-string elements are rendered as JSON
pub fn join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> std::result::Result<(), RenderError> {
    let separator = h.param(0).and_then(|v| v.value().as_str()).unwrap_or(",");

    let joined = match h.param(1).map(|v| v.value()) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator),
        Some(JsonValue::Null) | None => String::new(),
        Some(_) => return Err(RenderError::new("join helper requires array parameter")),
    };

    out.write(&joined)?;
    Ok(())
}

/// Register all built-in helpers with a Handlebars instance
pub fn register_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("timestamp", Box::new(timestamp_helper));
    handlebars.register_helper("upper", Box::new(upper_helper));
    handlebars.register_helper("normalize", Box::new(normalize_helper));
    handlebars.register_helper("default", Box::new(default_helper));
    handlebars.register_helper("join", Box::new(join_helper));
}
