//! Request and response bodies.
//!
//! A `Body` is used both as a body matcher (inside an expectation's request)
//! and as the concrete body of an inbound request or a response. The `type`
//! discriminator selects the matching strategy; `not`, `optional` and
//! `contentType` apply to every type.

use super::keys::Parameters;
use super::nottable::json_kind;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// How strictly a JSON body matcher compares documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Same fields, same array order and length.
    Strict,
    /// Extra fields, extra array items and array order are ignored.
    #[default]
    OnlyMatchingFields,
}

impl MatchType {
    fn as_str(&self) -> &'static str {
        match self {
            MatchType::Strict => "STRICT",
            MatchType::OnlyMatchingFields => "ONLY_MATCHING_FIELDS",
        }
    }
}

/// Body matching strategy and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    String { value: String, sub_string: bool },
    Regex(String),
    Json { json: Value, match_type: MatchType },
    JsonSchema(Value),
    JsonPath(String),
    Xml(String),
    XmlSchema(String),
    XPath(String),
    Binary(Vec<u8>),
    Parameters(Parameters),
}

impl BodyKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            BodyKind::String { .. } => "STRING",
            BodyKind::Regex(_) => "REGEX",
            BodyKind::Json { .. } => "JSON",
            BodyKind::JsonSchema(_) => "JSON_SCHEMA",
            BodyKind::JsonPath(_) => "JSON_PATH",
            BodyKind::Xml(_) => "XML",
            BodyKind::XmlSchema(_) => "XML_SCHEMA",
            BodyKind::XPath(_) => "XPATH",
            BodyKind::Binary(_) => "BINARY",
            BodyKind::Parameters(_) => "PARAMETERS",
        }
    }
}

/// Body with matching flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub kind: BodyKind,
    pub not: bool,
    pub optional: bool,
    pub content_type: Option<String>,
}

impl Body {
    fn of(kind: BodyKind) -> Self {
        Self {
            kind,
            not: false,
            optional: false,
            content_type: None,
        }
    }

    /// Exact string body.
    pub fn exact(value: impl Into<String>) -> Self {
        Self::of(BodyKind::String {
            value: value.into(),
            sub_string: false,
        })
    }

    /// Body that must contain `value`.
    pub fn sub_string(value: impl Into<String>) -> Self {
        Self::of(BodyKind::String {
            value: value.into(),
            sub_string: true,
        })
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::of(BodyKind::Regex(pattern.into()))
    }

    /// JSON body compared with `ONLY_MATCHING_FIELDS`.
    pub fn json(json: Value) -> Self {
        Self::json_with(json, MatchType::OnlyMatchingFields)
    }

    pub fn json_with(json: Value, match_type: MatchType) -> Self {
        Self::of(BodyKind::Json { json, match_type })
    }

    pub fn json_schema(schema: Value) -> Self {
        Self::of(BodyKind::JsonSchema(schema))
    }

    pub fn json_path(path: impl Into<String>) -> Self {
        Self::of(BodyKind::JsonPath(path.into()))
    }

    pub fn xml(xml: impl Into<String>) -> Self {
        Self::of(BodyKind::Xml(xml.into()))
    }

    pub fn xml_schema(schema: impl Into<String>) -> Self {
        Self::of(BodyKind::XmlSchema(schema.into()))
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::of(BodyKind::XPath(xpath.into()))
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::of(BodyKind::Binary(bytes.into()))
    }

    /// Form (`application/x-www-form-urlencoded`) parameters.
    pub fn parameters(parameters: Parameters) -> Self {
        Self::of(BodyKind::Parameters(parameters))
    }

    pub fn negate(mut self) -> Self {
        self.not = !self.not;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Raw text of the body as it would travel on the wire.
    pub fn as_string(&self) -> String {
        match &self.kind {
            BodyKind::String { value, .. } => value.clone(),
            BodyKind::Regex(s)
            | BodyKind::JsonPath(s)
            | BodyKind::Xml(s)
            | BodyKind::XmlSchema(s)
            | BodyKind::XPath(s) => s.clone(),
            BodyKind::Json { json, .. } => match json {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            },
            BodyKind::JsonSchema(schema) => schema.to_string(),
            BodyKind::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            BodyKind::Parameters(params) => params
                .entries
                .iter()
                .flat_map(|entry| {
                    entry.values.iter().map(move |value| {
                        format!(
                            "{}={}",
                            urlencoding::encode(entry.name.value()),
                            urlencoding::encode(value.value())
                        )
                    })
                })
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// Raw bytes of the body.
    pub fn as_bytes(&self) -> Vec<u8> {
        match &self.kind {
            BodyKind::Binary(bytes) => bytes.clone(),
            _ => self.as_string().into_bytes(),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(Self::exact(s.as_str())),
            Value::Array(_) => Ok(Self::json(value.clone())),
            Value::Object(map) => match map.get("type") {
                None => Ok(Self::json(value.clone())),
                Some(Value::String(body_type)) => Self::from_typed(body_type, map),
                Some(other) => Err(format!(
                    "\"type\" must be a string, found {}",
                    json_kind(other)
                )),
            },
            other => Err(format!(
                "expected string or object, found {}",
                json_kind(other)
            )),
        }
    }

    fn from_typed(body_type: &str, map: &Map<String, Value>) -> Result<Self, String> {
        let kind = match body_type {
            "STRING" => BodyKind::String {
                value: required_str(map, "string")?,
                sub_string: optional_bool(map, "subString")?,
            },
            "REGEX" => BodyKind::Regex(required_str(map, "regex")?),
            "JSON" => {
                let json = match map.get("json") {
                    Some(Value::String(raw)) => serde_json::from_str(raw)
                        .map_err(|e| format!("\"json\" is not valid JSON: {e}"))?,
                    Some(v) => v.clone(),
                    None => return Err("JSON body requires \"json\"".to_string()),
                };
                let match_type = match map.get("matchType") {
                    None | Some(Value::Null) => MatchType::default(),
                    Some(Value::String(s)) if s == "STRICT" => MatchType::Strict,
                    Some(Value::String(s)) if s == "ONLY_MATCHING_FIELDS" => {
                        MatchType::OnlyMatchingFields
                    }
                    Some(_) => {
                        return Err(
                            "\"matchType\" must be STRICT or ONLY_MATCHING_FIELDS".to_string()
                        )
                    }
                };
                BodyKind::Json { json, match_type }
            }
            "JSON_SCHEMA" => BodyKind::JsonSchema(match map.get("jsonSchema") {
                Some(Value::String(raw)) => serde_json::from_str(raw)
                    .map_err(|e| format!("\"jsonSchema\" is not valid JSON: {e}"))?,
                Some(v @ Value::Object(_)) | Some(v @ Value::Bool(_)) => v.clone(),
                Some(other) => {
                    return Err(format!(
                        "\"jsonSchema\" must be an object, found {}",
                        json_kind(other)
                    ))
                }
                None => return Err("JSON_SCHEMA body requires \"jsonSchema\"".to_string()),
            }),
            "JSON_PATH" => BodyKind::JsonPath(required_str(map, "jsonPath")?),
            "XML" => BodyKind::Xml(required_str(map, "xml")?),
            "XML_SCHEMA" => BodyKind::XmlSchema(required_str(map, "xmlSchema")?),
            "XPATH" => BodyKind::XPath(required_str(map, "xpath")?),
            "BINARY" => {
                let encoded = required_str(map, "base64Bytes")?;
                BodyKind::Binary(
                    BASE64
                        .decode(encoded.as_bytes())
                        .map_err(|e| format!("\"base64Bytes\" is not valid base64: {e}"))?,
                )
            }
            "PARAMETERS" => BodyKind::Parameters(match map.get("parameters") {
                Some(v) => Parameters::from_json(v).map_err(|e| format!("parameters.{e}"))?,
                None => return Err("PARAMETERS body requires \"parameters\"".to_string()),
            }),
            other => return Err(format!("unknown body type \"{other}\"")),
        };

        let content_type = match map.get("contentType") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(format!(
                    "\"contentType\" must be a string, found {}",
                    json_kind(other)
                ))
            }
        };

        Ok(Self {
            kind,
            not: optional_bool(map, "not")?,
            optional: optional_bool(map, "optional")?,
            content_type,
        })
    }

    pub fn to_json(&self) -> Value {
        if let BodyKind::String {
            value,
            sub_string: false,
        } = &self.kind
        {
            if !self.not && !self.optional && self.content_type.is_none() {
                return Value::String(value.clone());
            }
        }

        let mut map = Map::new();
        if self.not {
            map.insert("not".to_string(), Value::Bool(true));
        }
        if self.optional {
            map.insert("optional".to_string(), Value::Bool(true));
        }
        map.insert(
            "type".to_string(),
            Value::String(self.kind.type_name().to_string()),
        );
        match &self.kind {
            BodyKind::String { value, sub_string } => {
                map.insert("string".to_string(), Value::String(value.clone()));
                if *sub_string {
                    map.insert("subString".to_string(), Value::Bool(true));
                }
            }
            BodyKind::Regex(s) => {
                map.insert("regex".to_string(), Value::String(s.clone()));
            }
            BodyKind::Json { json, match_type } => {
                map.insert("json".to_string(), json.clone());
                if *match_type != MatchType::default() {
                    map.insert(
                        "matchType".to_string(),
                        Value::String(match_type.as_str().to_string()),
                    );
                }
            }
            BodyKind::JsonSchema(schema) => {
                map.insert("jsonSchema".to_string(), schema.clone());
            }
            BodyKind::JsonPath(s) => {
                map.insert("jsonPath".to_string(), Value::String(s.clone()));
            }
            BodyKind::Xml(s) => {
                map.insert("xml".to_string(), Value::String(s.clone()));
            }
            BodyKind::XmlSchema(s) => {
                map.insert("xmlSchema".to_string(), Value::String(s.clone()));
            }
            BodyKind::XPath(s) => {
                map.insert("xpath".to_string(), Value::String(s.clone()));
            }
            BodyKind::Binary(bytes) => {
                map.insert("base64Bytes".to_string(), Value::String(BASE64.encode(bytes)));
            }
            BodyKind::Parameters(params) => {
                map.insert("parameters".to_string(), params.to_json());
            }
        }
        if let Some(content_type) = &self.content_type {
            map.insert("contentType".to_string(), Value::String(content_type.clone()));
        }
        Value::Object(map)
    }
}

fn required_str(map: &Map<String, Value>, key: &str) -> Result<String, String> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(format!(
            "\"{key}\" must be a string, found {}",
            json_kind(other)
        )),
        None => Err(format!("missing \"{key}\"")),
    }
}

fn optional_bool(map: &Map<String, Value>, key: &str) -> Result<bool, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(format!(
            "\"{key}\" must be a boolean, found {}",
            json_kind(other)
        )),
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::nottable::string;
    use serde_json::json;

    #[test]
    fn test_plain_string_is_exact_body() {
        let body = Body::from_json(&json!("some_body")).unwrap();
        assert_eq!(body, Body::exact("some_body"));
        assert_eq!(body.to_json(), json!("some_body"));
    }

    #[test]
    fn test_untyped_object_is_json_body() {
        let body = Body::from_json(&json!({"id": 1})).unwrap();
        assert_eq!(body, Body::json(json!({"id": 1})));
    }

    #[test]
    fn test_typed_bodies() {
        let body = Body::from_json(&json!({
            "type": "JSON",
            "json": "{\"id\": 1}",
            "matchType": "STRICT"
        }))
        .unwrap();
        assert_eq!(body, Body::json_with(json!({"id": 1}), MatchType::Strict));

        let body = Body::from_json(&json!({"type": "XPATH", "xpath": "/a", "not": true})).unwrap();
        assert_eq!(body, Body::xpath("/a").negate());

        let body = Body::from_json(&json!({"type": "BINARY", "base64Bytes": "AQID"})).unwrap();
        assert_eq!(body.as_bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn test_typed_body_errors() {
        assert!(Body::from_json(&json!({"type": "REGEX"}))
            .unwrap_err()
            .contains("regex"));
        assert!(Body::from_json(&json!({"type": "YAML", "yaml": "a: b"}))
            .unwrap_err()
            .contains("unknown body type"));
        assert!(Body::from_json(&json!({"type": "BINARY", "base64Bytes": "%%%"})).is_err());
    }

    #[test]
    fn test_to_json_keeps_flags() {
        let body = Body::sub_string("abc").with_content_type("text/plain");
        assert_eq!(
            body.to_json(),
            json!({"type": "STRING", "string": "abc", "subString": true, "contentType": "text/plain"})
        );
        assert_eq!(Body::from_json(&body.to_json()).unwrap(), body);
    }

    #[test]
    fn test_parameters_as_form_string() {
        let params = Parameters::new()
            .with_entry("name", vec![string("a b")])
            .with_entry("id", vec![string("1")]);
        assert_eq!(Body::parameters(params).as_string(), "name=a%20b&id=1");
    }
}
