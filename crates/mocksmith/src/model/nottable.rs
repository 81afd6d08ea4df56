//! Strings that can be negated, marked optional or carry a JSON schema.
//!
//! Every string inside a request matcher (method, path, header names and
//! values, cookie values, ...) is a `NottableString`. Inbound requests use the
//! same type with all flags cleared.
//!
//! JSON forms:
//! - `"value"` - plain string
//! - `"!value"` - negated
//! - `"?value"` - optional (meaningful for collection keys)
//! - `{"not": true, "optional": false, "value": "..."}` - explicit form
//! - `{"schema": {...}}` - value validated against a JSON schema

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

const NOT_PREFIX: char = '!';
const OPTIONAL_PREFIX: char = '?';

/// A string value with `not`, `optional` and schema flags.
///
/// Equality is structural over all four fields. For schema strings `value`
/// holds the compact JSON text of the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NottableString {
    value: String,
    not: bool,
    optional: bool,
    schema: bool,
}

impl NottableString {
    /// Plain string, taken literally.
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Negated string.
    pub fn not(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            not: true,
            ..Default::default()
        }
    }

    /// Optional string.
    pub fn optional(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            optional: true,
            ..Default::default()
        }
    }

    /// String whose value must validate against `schema`.
    pub fn schema(schema: Value) -> Self {
        Self {
            value: schema.to_string(),
            schema: true,
            ..Default::default()
        }
    }

    /// Parse the `!`/`?` prefix shorthand used in JSON.
    pub fn parse(raw: &str) -> Self {
        if raw.len() > 1 {
            if let Some(rest) = raw.strip_prefix(NOT_PREFIX) {
                return Self::not(rest);
            }
            if let Some(rest) = raw.strip_prefix(OPTIONAL_PREFIX) {
                return Self::optional(rest);
            }
        }
        Self::string(raw)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_not(&self) -> bool {
        self.not
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_schema(&self) -> bool {
        self.schema
    }

    /// True when the string places no constraint: an empty, non-schema value.
    pub fn is_blank(&self) -> bool {
        !self.schema && self.value.is_empty()
    }

    /// The parsed schema document, for schema strings.
    pub fn schema_value(&self) -> Option<Value> {
        if self.schema {
            serde_json::from_str(&self.value).ok()
        } else {
            None
        }
    }

    /// Same value with the `not` flag set to `not`.
    pub fn with_not(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    /// Same value with the `optional` flag set to `optional`.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Same value and flags with `not` inverted.
    pub fn negate(mut self) -> Self {
        self.not = !self.not;
        self
    }

    /// Copy with `not` and `optional` cleared, keeping value and schema flag.
    pub fn plain(&self) -> Self {
        Self {
            value: self.value.clone(),
            not: false,
            optional: false,
            schema: self.schema,
        }
    }

    /// Decode from any accepted JSON form.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(Self::parse(s)),
            Value::Number(n) => Ok(Self::string(n.to_string())),
            Value::Bool(b) => Ok(Self::string(b.to_string())),
            Value::Object(map) => {
                let not = flag(map, "not")?;
                let optional = flag(map, "optional")?;
                let base = if let Some(schema) = map.get("schema") {
                    if !schema.is_object() && !schema.is_boolean() {
                        return Err("\"schema\" must be a JSON schema object".to_string());
                    }
                    Self::schema(schema.clone())
                } else {
                    match map.get("value") {
                        Some(Value::String(s)) => Self::string(s.as_str()),
                        Some(Value::Number(n)) => Self::string(n.to_string()),
                        Some(Value::Bool(b)) => Self::string(b.to_string()),
                        Some(_) => return Err("\"value\" must be a string".to_string()),
                        None => {
                            return Err("object form requires \"value\" or \"schema\"".to_string())
                        }
                    }
                };
                Ok(base.with_not(not).with_optional(optional))
            }
            other => Err(format!("expected string or object, found {}", json_kind(other))),
        }
    }

    /// Encode into the most compact JSON form that decodes back to `self`.
    pub fn to_json(&self) -> Value {
        if self.schema {
            let mut map = Map::new();
            if self.not {
                map.insert("not".to_string(), Value::Bool(true));
            }
            if self.optional {
                map.insert("optional".to_string(), Value::Bool(true));
            }
            map.insert(
                "schema".to_string(),
                self.schema_value().unwrap_or(Value::Null),
            );
            return Value::Object(map);
        }

        let ambiguous = self.value.starts_with(NOT_PREFIX) || self.value.starts_with(OPTIONAL_PREFIX);
        match (self.not, self.optional) {
            (false, false) if !ambiguous => Value::String(self.value.clone()),
            (true, false) if !ambiguous && !self.value.is_empty() => {
                Value::String(format!("{NOT_PREFIX}{}", self.value))
            }
            (false, true) if !ambiguous && !self.value.is_empty() => {
                Value::String(format!("{OPTIONAL_PREFIX}{}", self.value))
            }
            _ => {
                let mut map = Map::new();
                if self.not {
                    map.insert("not".to_string(), Value::Bool(true));
                }
                if self.optional {
                    map.insert("optional".to_string(), Value::Bool(true));
                }
                map.insert("value".to_string(), Value::String(self.value.clone()));
                Value::Object(map)
            }
        }
    }
}

fn flag(map: &Map<String, Value>, key: &str) -> Result<bool, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(format!(
            "\"{key}\" must be a boolean, found {}",
            json_kind(other)
        )),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for NottableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.not {
            write!(f, "{NOT_PREFIX}")?;
        }
        if self.optional {
            write!(f, "{OPTIONAL_PREFIX}")?;
        }
        if self.schema {
            write!(f, "schema:")?;
        }
        write!(f, "{}", self.value)
    }
}

impl From<&str> for NottableString {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for NottableString {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<&String> for NottableString {
    fn from(value: &String) -> Self {
        Self::string(value.as_str())
    }
}

impl Serialize for NottableString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NottableString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        NottableString::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Plain string.
pub fn string(value: impl Into<String>) -> NottableString {
    NottableString::string(value)
}

/// Negated string.
pub fn not(value: impl Into<String>) -> NottableString {
    NottableString::not(value)
}

/// Optional string (absent key passes, present key must match).
pub fn optional(value: impl Into<String>) -> NottableString {
    NottableString::optional(value)
}

/// String validated against a JSON schema.
pub fn schema_string(schema: Value) -> NottableString {
    NottableString::schema(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(NottableString::parse("!GET"), not("GET"));
        assert_eq!(NottableString::parse("?limit"), optional("limit"));
        assert_eq!(NottableString::parse("plain"), string("plain"));
        // A lone prefix character is taken literally
        assert_eq!(NottableString::parse("!"), string("!"));
    }

    #[test]
    fn test_json_forms_decode() {
        let decoded: NottableString = serde_json::from_value(json!("!Accept")).unwrap();
        assert_eq!(decoded, not("Accept"));

        let decoded: NottableString =
            serde_json::from_value(json!({"not": true, "value": "!literal"})).unwrap();
        assert!(decoded.is_not());
        assert_eq!(decoded.value(), "!literal");

        let decoded: NottableString =
            serde_json::from_value(json!({"schema": {"type": "integer"}})).unwrap();
        assert!(decoded.is_schema());
        assert_eq!(decoded.schema_value(), Some(json!({"type": "integer"})));

        let decoded: NottableString = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(decoded, string("42"));
    }

    #[test]
    fn test_json_forms_reject_bad_shapes() {
        assert!(serde_json::from_value::<NottableString>(json!([1])).is_err());
        assert!(serde_json::from_value::<NottableString>(json!({"not": "yes", "value": "x"})).is_err());
        assert!(serde_json::from_value::<NottableString>(json!({"not": true})).is_err());
    }

    #[test]
    fn test_encoding_is_compact_and_unambiguous() {
        assert_eq!(string("x").to_json(), json!("x"));
        assert_eq!(not("x").to_json(), json!("!x"));
        assert_eq!(optional("x").to_json(), json!("?x"));
        assert_eq!(string("!x").to_json(), json!({"value": "!x"}));
        assert_eq!(
            not("x").with_optional(true).to_json(),
            json!({"not": true, "optional": true, "value": "x"})
        );
        assert_eq!(
            schema_string(json!({"type": "string"})).negate().to_json(),
            json!({"not": true, "schema": {"type": "string"}})
        );
    }

    #[test]
    fn test_blank() {
        assert!(string("").is_blank());
        assert!(!string(" ").is_blank());
        assert!(!schema_string(json!({})).is_blank());
    }
}
