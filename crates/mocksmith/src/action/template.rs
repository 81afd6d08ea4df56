//! Response templating.
//!
//! A template renders to the JSON form of an `HttpResponse`. The built-in
//! [`ReferenceTemplateEngine`] substitutes request references and is
//! registered for `VELOCITY` templates; other template types need an
//! engine supplied by the embedder.
//!
//! # Supported References
//!
//! - `${request.path}` - The request path
//! - `${request.method}` - The HTTP method
//! - `${request.queryStringParameters.<name>}` - First query parameter value
//! - `${request.headers.<name>}` - First header value (case-insensitive)
//! - `${request.pathParameters.<name>}` - Path parameter
//! - `${request.cookies.<name>}` - Cookie value
//! - `${request.body}` - The raw request body
//!
//! # Example
//!
//! ```json
//! {"statusCode": 200, "body": "{\"echo\": \"${request.queryStringParameters.message}\"}"}
//! ```
//!
//! Substituted values are JSON-string escaped so that they can sit inside a
//! quoted string of the template.

use crate::model::{HttpRequest, HttpResponse, TemplateType};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Regex for request references: ${request.path}, ${request.headers.name}, etc.
static REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{request\.([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)?)\}").unwrap()
});

/// Renders a template against the request that matched.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, request: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// Template engines by template type.
#[derive(Clone)]
pub struct TemplateEngines {
    engines: HashMap<TemplateType, Arc<dyn TemplateEngine>>,
}

impl Default for TemplateEngines {
    fn default() -> Self {
        Self::empty().with_engine(TemplateType::Velocity, Arc::new(ReferenceTemplateEngine))
    }
}

impl TemplateEngines {
    /// Registry without any engine.
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    pub fn with_engine(mut self, template_type: TemplateType, engine: Arc<dyn TemplateEngine>) -> Self {
        self.register(template_type, engine);
        self
    }

    pub fn register(&mut self, template_type: TemplateType, engine: Arc<dyn TemplateEngine>) {
        self.engines.insert(template_type, engine);
    }

    pub fn get(&self, template_type: TemplateType) -> Option<&Arc<dyn TemplateEngine>> {
        self.engines.get(&template_type)
    }
}

impl std::fmt::Debug for TemplateEngines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.engines.keys().map(TemplateType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("TemplateEngines").field("types", &types).finish()
    }
}

/// Reference-substituting engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceTemplateEngine;

/// Value of a dotted reference such as `headers.content-type`.
fn lookup(request: &HttpRequest, reference: &str) -> Option<String> {
    let parts: Vec<&str> = reference.splitn(2, '.').collect();
    match parts.as_slice() {
        ["path"] => Some(request.path_str().to_string()),
        ["method"] => Some(request.method_str().to_string()),
        ["body"] => request.body.as_ref().map(|b| b.as_string()),
        ["queryStringParameters", name] | ["query", name] => request
            .query_string_parameters
            .as_ref()
            .and_then(|p| p.first_value(name, false))
            .map(str::to_string),
        ["pathParameters", name] => request
            .path_parameters
            .as_ref()
            .and_then(|p| p.first_value(name, false))
            .map(str::to_string),
        ["headers", name] => request.first_header(name).map(str::to_string),
        ["cookies", name] => request
            .cookies
            .as_ref()
            .and_then(|c| c.get(name))
            .map(str::to_string),
        _ => None,
    }
}

fn escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Substitute every request reference in `template`; unknown references
/// become empty.
pub fn process_template(template: &str, request: &HttpRequest) -> String {
    REFERENCE_REGEX
        .replace_all(template, |caps: &regex::Captures| {
            escape(&lookup(request, &caps[1]).unwrap_or_default())
        })
        .to_string()
}

/// Check if a string contains request references
pub fn has_template_variables(s: &str) -> bool {
    REFERENCE_REGEX.is_match(s)
}

impl TemplateEngine for ReferenceTemplateEngine {
    fn render(&self, template: &str, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let rendered = process_template(template, request);
        serde_json::from_str(&rendered)
            .with_context(|| format!("Template did not render an HTTP response: {rendered}"))
    }
}
