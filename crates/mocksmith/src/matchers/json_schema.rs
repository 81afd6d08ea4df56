//! JSON Schema validation for schema bodies and schema-valued strings.
//!
//! Compiled validators are cached by schema text so that a schema attached to
//! a header or parameter is compiled once, not per request.

use super::difference::MatchDifference;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const MAX_CACHED_VALIDATORS: usize = 1024;

static VALIDATORS: Lazy<RwLock<HashMap<String, Arc<JsonSchemaValidator>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compiled JSON schema.
pub struct JsonSchemaValidator {
    schema: Value,
    compiled: JSONSchema,
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

impl JsonSchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, String> {
        let compiled =
            JSONSchema::compile(schema).map_err(|e| format!("invalid JSON schema: {e}"))?;
        Ok(Self {
            schema: schema.clone(),
            compiled,
        })
    }

    /// Compile through the shared cache.
    pub fn cached(schema: &Value) -> Result<Arc<Self>, String> {
        let key = schema.to_string();
        if let Some(found) = VALIDATORS.read().get(&key) {
            return Ok(Arc::clone(found));
        }
        let validator = Arc::new(Self::new(schema)?);
        let mut cache = VALIDATORS.write();
        if cache.len() >= MAX_CACHED_VALIDATORS {
            cache.clear();
        }
        cache.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validation failures, empty when `instance` is valid.
    pub fn validate(&self, instance: &Value) -> Vec<String> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let location = e.instance_path.to_string();
                    if location.is_empty() {
                        e.to_string()
                    } else {
                        format!("{e} at {location}")
                    }
                })
                .collect(),
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Validate a plain string value, first coercing it to the schema's
    /// declared `type` (`"10"` validates against `{"type": "integer"}`).
    pub fn validate_text(&self, text: &str) -> Vec<String> {
        self.validate(&coerce_to_schema_type(&self.schema, text))
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn coerce_to_schema_type(schema: &Value, text: &str) -> Value {
    let types = declared_types(schema);
    let wants_string = types.is_empty() || types.contains(&"string");
    let trimmed = text.trim();

    for t in &types {
        match *t {
            "integer" | "number" => {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Value::from(n);
                }
                if let Some(n) = trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    return Value::Number(n);
                }
            }
            "boolean" => {
                if let Ok(b) = trimmed.parse::<bool>() {
                    return Value::Bool(b);
                }
            }
            "null" if trimmed == "null" => return Value::Null,
            "object" | "array" => {
                if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
                    if v.is_object() || v.is_array() {
                        return v;
                    }
                }
            }
            _ => {}
        }
    }

    if wants_string {
        Value::String(text.to_string())
    } else {
        serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

/// JSON_SCHEMA body matcher.
#[derive(Debug, Clone)]
pub struct JsonSchemaMatcher {
    validator: Result<Arc<JsonSchemaValidator>, String>,
}

impl JsonSchemaMatcher {
    pub fn new(schema: &Value) -> Self {
        Self {
            validator: JsonSchemaValidator::cached(schema),
        }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let validator = match &self.validator {
            Ok(v) => v,
            Err(e) => {
                debug!("json schema matcher cannot compile schema: {}", e);
                if let Some(ctx) = context {
                    ctx.add(e.clone());
                }
                return false;
            }
        };

        let instance: Value = match serde_json::from_str(matched) {
            Ok(v) => v,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(format!("failed to parse body as JSON: {e}"));
                }
                return false;
            }
        };

        let errors = validator.validate(&instance);
        if errors.is_empty() {
            true
        } else {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "json schema match failed, {} error(s): {}",
                    errors.len(),
                    errors.join("; ")
                ));
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::difference::MatchDifferenceField;
    use serde_json::json;

    #[test]
    fn test_text_coercion() {
        let validator = JsonSchemaValidator::new(&json!({"type": "integer"})).unwrap();
        assert!(validator.validate_text("10").is_empty());
        assert!(!validator.validate_text("ten").is_empty());

        let validator =
            JsonSchemaValidator::new(&json!({"type": "string", "pattern": "^[A-Z0-9-]+$"}))
                .unwrap();
        assert!(validator.validate_text("055CA455-1DF7").is_empty());
        assert!(validator.validate_text("12345").is_empty());
        assert!(!validator.validate_text("lower").is_empty());
    }

    #[test]
    fn test_body_matcher_reports_errors() {
        let matcher = JsonSchemaMatcher::new(&json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        }));
        assert!(matcher.matches(None, r#"{"id": 1}"#));

        let mut diff = MatchDifference::new();
        diff.set_field(MatchDifferenceField::Body);
        assert!(!matcher.matches(Some(&mut diff), r#"{"name": "x"}"#));
        assert!(diff.get(MatchDifferenceField::Body).unwrap().contains("1 error"));
    }

    #[test]
    fn test_unparseable_body_is_mismatch() {
        let matcher = JsonSchemaMatcher::new(&json!({"type": "object"}));
        assert!(!matcher.matches(None, "not json"));
    }

    #[test]
    fn test_invalid_schema_is_mismatch() {
        let matcher = JsonSchemaMatcher::new(&json!({"type": 12}));
        assert!(!matcher.matches(None, "{}"));
    }
}
