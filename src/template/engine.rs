// ABOUTME: Template engine implementation using Handlebars
// ABOUTME: Renders prompt strings and resolves templated JSON documents against a payload

use handlebars::Handlebars;
use serde_json::Value as JsonValue;

use super::context::TemplateContext;
use super::error::{Result, TemplateError};
use super::helpers;
use crate::JsonMap;

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with all built-in helpers
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.set_dev_mode(false);

        // Output is JSON and plain prompt text, never HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        helpers::register_helpers(&mut handlebars);

        Self { handlebars }
    }

    /// Compile and store a named template
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// Render a previously registered template
    pub fn render_named(&self, name: &str, context: &TemplateContext) -> Result<String> {
        self.render_named_with_json(name, &context.to_json()?)
    }

    pub fn render_named_with_json(&self, name: &str, context: &JsonValue) -> Result<String> {
        if !self.has_template(name) {
            return Err(TemplateError::UnknownTemplate(name.to_string()));
        }
        Ok(self.handlebars.render(name, context)?)
    }

    /// Render a template string with the given context
    pub fn render(&self, template: &str, context: &TemplateContext) -> Result<String> {
        let json_context = context.to_json()?;
        self.render_with_json(template, &json_context)
    }

    /// Render a template string with JSON context
    pub fn render_with_json(&self, template: &str, context: &JsonValue) -> Result<String> {
        Ok(self.handlebars.render_template(template, context)?)
    }

    /// Recursively resolve templates in JSON string leaves
    pub fn resolve_json_templates(&self, value: &JsonValue, context: &JsonValue) -> Result<JsonValue> {
        match value {
            JsonValue::String(s) if self.has_templates(s) => {
                Ok(JsonValue::String(self.render_with_json(s, context)?))
            }
            JsonValue::Array(arr) => {
                let resolved: Result<Vec<JsonValue>> = arr
                    .iter()
                    .map(|v| self.resolve_json_templates(v, context))
                    .collect();
                Ok(JsonValue::Array(resolved?))
            }
            JsonValue::Object(obj) => {
                let mut resolved = JsonMap::new();
                for (key, val) in obj {
                    resolved.insert(key.clone(), self.resolve_json_templates(val, context)?);
                }
                Ok(JsonValue::Object(resolved))
            }
            // Numbers, booleans, null and plain strings pass through
            other => Ok(other.clone()),
        }
    }

    /// Resolve a templated document that must come out as a JSON object
    pub fn resolve_object(&self, document: &JsonValue, payload: &JsonMap) -> Result<JsonMap> {
        let context = JsonValue::Object(payload.clone());
        match self.resolve_json_templates(document, &context)? {
            JsonValue::Object(map) => Ok(map),
            other => Err(TemplateError::NotAnObject(other.to_string())),
        }
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }

    /// Check if a string contains template expressions
    pub fn has_templates(&self, text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{InputRecord, TicketState};
    use serde_json::json;

    #[test]
    fn test_render_with_ticket_context() {
        let engine = TemplateEngine::new();
        let state = TicketState::new(InputRecord::sample()).unwrap();
        let context = TemplateContext::for_ticket(&state);

        let result = engine
            .render("{{ticket.customer_name}} ({{ticket.priority}})", &context)
            .unwrap();
        assert_eq!(result, "John Smith (HIGH)");
    }

    #[test]
    fn test_named_templates() {
        let mut engine = TemplateEngine::new();
        engine
            .register_template("greeting", "Dear {{ticket.customer_name}}")
            .unwrap();
        assert!(engine.has_template("greeting"));

        let state = TicketState::new(InputRecord::sample()).unwrap();
        let context = TemplateContext::for_ticket(&state);
        assert_eq!(
            engine.render_named("greeting", &context).unwrap(),
            "Dear John Smith"
        );
        assert!(matches!(
            engine.render_named("missing", &context),
            Err(TemplateError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_json_template_resolution() {
        let engine = TemplateEngine::new();
        let context = json!({"customer_name": "Ada", "email": "ADA@EXAMPLE.COM"});

        let input = json!({
            "message": "Hello {{customer_name}}",
            "score": 92,
            "nested": {"email": "{{normalize email}}", "flags": [true, "{{upper customer_name}}"]},
            "plain": "no templates"
        });

        let resolved = engine.resolve_json_templates(&input, &context).unwrap();

        assert_eq!(resolved["message"], "Hello Ada");
        assert_eq!(resolved["score"], 92);
        assert_eq!(resolved["nested"]["email"], "ada@example.com");
        assert_eq!(resolved["nested"]["flags"][1], "ADA");
        assert_eq!(resolved["plain"], "no templates");
    }

    #[test]
    fn test_resolve_object_rejects_non_objects() {
        let engine = TemplateEngine::new();
        let payload = JsonMap::new();
        assert!(engine.resolve_object(&json!({"a": 1}), &payload).is_ok());
        assert!(matches!(
            engine.resolve_object(&json!(["a"]), &payload),
            Err(TemplateError::NotAnObject(_))
        ));
    }

    #[test]
    fn test_template_validation() {
        let engine = TemplateEngine::new();
        assert!(engine.validate_template("Hello {{name}}").is_ok());
        assert!(engine.validate_template("Hello {{name}").is_err());
        assert!(engine
            .validate_template("{{#if condition}}true{{else}}false{{/if}}")
            .is_ok());
    }
}
