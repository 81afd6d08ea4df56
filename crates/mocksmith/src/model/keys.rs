//! Keyed collections: headers, query/path parameters and cookies.
//!
//! Headers and parameters map a key to many values (`KeysToMultiValues`);
//! cookies map a key to a single value (`Cookies`). Both keep insertion order.
//!
//! JSON forms accepted for multi-value collections:
//! - map: `{"Accept": ["text/html", "application/json"], "X-Id": "1"}`
//! - map with style: `{"keyMatchStyle": "MATCHING_KEY", "Accept": ["text/html"]}`
//! - list: `[{"name": "Accept", "values": ["text/html"]}]`

use super::nottable::{json_kind, NottableString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

const KEY_MATCH_STYLE: &str = "keyMatchStyle";

/// How the keys of a matcher collection relate to the matched collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyMatchStyle {
    /// The matched side may carry keys the matcher does not name.
    #[default]
    SubSet,
    /// The matched side must carry exactly the keys the matcher names.
    MatchingKey,
}

impl KeyMatchStyle {
    fn as_str(&self) -> &'static str {
        match self {
            KeyMatchStyle::SubSet => "SUB_SET",
            KeyMatchStyle::MatchingKey => "MATCHING_KEY",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUB_SET" => Some(KeyMatchStyle::SubSet),
            "MATCHING_KEY" => Some(KeyMatchStyle::MatchingKey),
            _ => None,
        }
    }
}

/// One key with its values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyToMultiValue {
    pub name: NottableString,
    pub values: Vec<NottableString>,
}

impl KeyToMultiValue {
    pub fn new(name: impl Into<NottableString>, values: Vec<NottableString>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Ordered multi-value map used for headers, query string and path parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeysToMultiValues {
    pub entries: Vec<KeyToMultiValue>,
    pub key_match_style: KeyMatchStyle,
}

pub type Headers = KeysToMultiValues;
pub type Parameters = KeysToMultiValues;

impl KeysToMultiValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_match_style(mut self, style: KeyMatchStyle) -> Self {
        self.key_match_style = style;
        self
    }

    /// Add values under `name`, appending to an existing identical key.
    pub fn with_entry(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = NottableString>,
    ) -> Self {
        self.add(name, values);
        self
    }

    pub fn add(
        &mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = NottableString>,
    ) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.values.extend(values),
            None => self.entries.push(KeyToMultiValue {
                name,
                values: values.into_iter().collect(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All values of keys equal to `name` (literal comparison).
    pub fn values(&self, name: &str, ignore_case: bool) -> Vec<&NottableString> {
        self.entries
            .iter()
            .filter(|e| key_equals(e.name.value(), name, ignore_case))
            .flat_map(|e| e.values.iter())
            .collect()
    }

    /// First value of the key `name`, if any.
    pub fn first_value(&self, name: &str, ignore_case: bool) -> Option<&str> {
        self.values(name, ignore_case)
            .into_iter()
            .next()
            .map(|v| v.value())
    }

    pub fn contains_key(&self, name: &str, ignore_case: bool) -> bool {
        self.entries
            .iter()
            .any(|e| key_equals(e.name.value(), name, ignore_case))
    }

    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => {
                let mut result = Self::new();
                for (key, raw_values) in map {
                    if key == KEY_MATCH_STYLE {
                        let style = raw_values
                            .as_str()
                            .and_then(KeyMatchStyle::parse)
                            .ok_or_else(|| {
                                format!("\"{KEY_MATCH_STYLE}\" must be SUB_SET or MATCHING_KEY")
                            })?;
                        result.key_match_style = style;
                        continue;
                    }
                    let values = decode_values(raw_values).map_err(|e| format!("{key}: {e}"))?;
                    result.add(NottableString::parse(key), values);
                }
                Ok(result)
            }
            Value::Array(items) => {
                let mut result = Self::new();
                for (index, item) in items.iter().enumerate() {
                    let obj = item
                        .as_object()
                        .ok_or_else(|| format!("[{index}]: expected object with \"name\""))?;
                    let name = obj
                        .get("name")
                        .ok_or_else(|| format!("[{index}]: missing \"name\""))
                        .and_then(|n| {
                            NottableString::from_json(n).map_err(|e| format!("[{index}].name: {e}"))
                        })?;
                    let values = match obj.get("values").or_else(|| obj.get("value")) {
                        Some(v) => decode_values(v).map_err(|e| format!("[{index}].values: {e}"))?,
                        None => Vec::new(),
                    };
                    result.add(name, values);
                }
                Ok(result)
            }
            other => Err(format!(
                "expected object or array, found {}",
                json_kind(other)
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        let map_form = self
            .entries
            .iter()
            .all(|e| matches!(e.name.to_json(), Value::String(_)));

        if !map_form {
            return Value::Array(
                self.entries
                    .iter()
                    .map(|e| {
                        let mut obj = Map::new();
                        obj.insert("name".to_string(), e.name.to_json());
                        obj.insert(
                            "values".to_string(),
                            Value::Array(e.values.iter().map(NottableString::to_json).collect()),
                        );
                        Value::Object(obj)
                    })
                    .collect(),
            );
        }

        let mut map = Map::new();
        if self.key_match_style != KeyMatchStyle::SubSet {
            map.insert(
                KEY_MATCH_STYLE.to_string(),
                Value::String(self.key_match_style.as_str().to_string()),
            );
        }
        for entry in &self.entries {
            if let Value::String(key) = entry.name.to_json() {
                map.insert(
                    key,
                    Value::Array(entry.values.iter().map(NottableString::to_json).collect()),
                );
            }
        }
        Value::Object(map)
    }
}

fn decode_values(raw: &Value) -> Result<Vec<NottableString>, String> {
    match raw {
        Value::Array(items) => items.iter().map(NottableString::from_json).collect(),
        Value::Null => Ok(Vec::new()),
        single => Ok(vec![NottableString::from_json(single)?]),
    }
}

pub(crate) fn key_equals(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

impl Serialize for KeysToMultiValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KeysToMultiValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// One cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyAndValue {
    pub name: NottableString,
    pub value: NottableString,
}

/// Ordered single-value map used for cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cookies {
    pub entries: Vec<KeyAndValue>,
}

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.entries.push(KeyAndValue {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name.value() == name)
            .map(|e| e.value.value())
    }

    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => {
                let mut result = Self::new();
                for (key, raw) in map {
                    let value = NottableString::from_json(raw).map_err(|e| format!("{key}: {e}"))?;
                    result = result.with_entry(NottableString::parse(key), value);
                }
                Ok(result)
            }
            Value::Array(items) => {
                let mut result = Self::new();
                for (index, item) in items.iter().enumerate() {
                    let obj = item
                        .as_object()
                        .ok_or_else(|| format!("[{index}]: expected object with \"name\""))?;
                    let name = obj
                        .get("name")
                        .ok_or_else(|| format!("[{index}]: missing \"name\""))
                        .and_then(|n| {
                            NottableString::from_json(n).map_err(|e| format!("[{index}].name: {e}"))
                        })?;
                    let value = match obj.get("value") {
                        Some(v) => NottableString::from_json(v)
                            .map_err(|e| format!("[{index}].value: {e}"))?,
                        None => NottableString::default(),
                    };
                    result = result.with_entry(name, value);
                }
                Ok(result)
            }
            other => Err(format!(
                "expected object or array, found {}",
                json_kind(other)
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        let map_form = self
            .entries
            .iter()
            .all(|e| matches!(e.name.to_json(), Value::String(_)));

        if map_form {
            let mut map = Map::new();
            for entry in &self.entries {
                if let Value::String(key) = entry.name.to_json() {
                    map.insert(key, entry.value.to_json());
                }
            }
            Value::Object(map)
        } else {
            Value::Array(
                self.entries
                    .iter()
                    .map(|e| {
                        let mut obj = Map::new();
                        obj.insert("name".to_string(), e.name.to_json());
                        obj.insert("value".to_string(), e.value.to_json());
                        Value::Object(obj)
                    })
                    .collect(),
            )
        }
    }
}

impl Serialize for Cookies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cookies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::nottable::{not, string};
    use serde_json::json;

    #[test]
    fn test_map_form_with_style() {
        let headers = KeysToMultiValues::from_json(&json!({
            "keyMatchStyle": "MATCHING_KEY",
            "Accept": ["text/html", "!application/xml"],
            "X-Id": "1"
        }))
        .unwrap();

        assert_eq!(headers.key_match_style, KeyMatchStyle::MatchingKey);
        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.values("accept", true),
            vec![&string("text/html"), &not("application/xml")]
        );
        assert_eq!(headers.first_value("X-Id", false), Some("1"));
    }

    #[test]
    fn test_list_form() {
        let params = KeysToMultiValues::from_json(&json!([
            {"name": "!cartId"},
            {"name": "type", "values": ["[A-Z]+"]}
        ]))
        .unwrap();

        assert_eq!(params.entries[0].name, not("cartId"));
        assert!(params.entries[0].values.is_empty());
        assert_eq!(params.first_value("type", false), Some("[A-Z]+"));
    }

    #[test]
    fn test_add_merges_identical_keys() {
        let headers = KeysToMultiValues::new()
            .with_entry("Accept", vec![string("a")])
            .with_entry("Accept", vec![string("b")]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.entries[0].values.len(), 2);
    }

    #[test]
    fn test_rejects_bad_style() {
        let err = KeysToMultiValues::from_json(&json!({"keyMatchStyle": "EXACT"})).unwrap_err();
        assert!(err.contains("keyMatchStyle"));
    }

    #[test]
    fn test_cookies_forms() {
        let cookies = Cookies::from_json(&json!({"session": "abc", "!tracking": "x"})).unwrap();
        assert_eq!(cookies.get("session"), Some("abc"));
        assert!(cookies.entries.iter().any(|e| e.name == not("tracking")));

        let listed = Cookies::from_json(&json!([{"name": "session", "value": "abc"}])).unwrap();
        assert_eq!(listed.get("session"), Some("abc"));
        assert_eq!(listed.to_json(), json!({"session": "abc"}));
    }
}
