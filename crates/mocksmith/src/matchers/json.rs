//! JSON body matcher.
//!
//! `STRICT` requires the same fields and arrays in the same order and length.
//! `ONLY_MATCHING_FIELDS` ignores extra object fields, extra array items and
//! array order. Expected string values may be placeholders:
//!
//! - `${json-unit.ignore}` - any value, field must exist
//! - `${json-unit.ignore-element}` - any value, field may be absent
//! - `${json-unit.any-string}`, `${json-unit.any-number}`, `${json-unit.any-boolean}`
//! - `${json-unit.regex}<pattern>` - string matching the pattern

use super::difference::MatchDifference;
use super::regex_string::regex_matches;
use crate::model::MatchType;
use serde_json::{Map, Value};

const IGNORE: &str = "${json-unit.ignore}";
const IGNORE_ELEMENT: &str = "${json-unit.ignore-element}";
const ANY_STRING: &str = "${json-unit.any-string}";
const ANY_NUMBER: &str = "${json-unit.any-number}";
const ANY_BOOLEAN: &str = "${json-unit.any-boolean}";
const REGEX_PREFIX: &str = "${json-unit.regex}";

#[derive(Debug, Clone)]
pub struct JsonStringMatcher {
    expected: Value,
    match_type: MatchType,
}

impl JsonStringMatcher {
    pub fn new(expected: Value, match_type: MatchType) -> Self {
        // An expected document supplied as JSON text is compared as a document
        let expected = match expected {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            other => other,
        };
        Self {
            expected,
            match_type,
        }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let actual: Value = match serde_json::from_str(matched) {
            Ok(v) => v,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(format!("failed to parse body as JSON: {e}"));
                }
                return false;
            }
        };

        let strict = self.match_type == MatchType::Strict;
        match compare(&self.expected, &actual, strict, "$") {
            None => true,
            Some(difference) => {
                if let Some(ctx) = context {
                    ctx.add(format!(
                        "json match failed expected:\n  {}\n found:\n  {}\n failed because:\n  {}",
                        self.expected, actual, difference
                    ));
                }
                false
            }
        }
    }
}

/// First difference between `expected` and `actual`, or `None` when they match.
fn compare(expected: &Value, actual: &Value, strict: bool, path: &str) -> Option<String> {
    match (expected, actual) {
        (Value::String(placeholder), _) if is_placeholder(placeholder) => {
            placeholder_matches(placeholder, actual, path)
        }
        (Value::Object(e), Value::Object(a)) => compare_objects(e, a, strict, path),
        (Value::Array(e), Value::Array(a)) => {
            if strict {
                compare_ordered(e, a, path)
            } else {
                compare_unordered(e, a, path)
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let equal = match (e.as_i64(), a.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => e.as_f64() == a.as_f64(),
            };
            (!equal).then(|| format!("{path}: expected {e} but was {a}"))
        }
        (e, a) if e == a => None,
        (e, a) => Some(format!("{path}: expected {e} but was {a}")),
    }
}

fn is_placeholder(value: &str) -> bool {
    value.starts_with("${json-unit.")
}

fn placeholder_matches(placeholder: &str, actual: &Value, path: &str) -> Option<String> {
    let ok = match placeholder {
        IGNORE | IGNORE_ELEMENT => true,
        ANY_STRING => actual.is_string(),
        ANY_NUMBER => actual.is_number(),
        ANY_BOOLEAN => actual.is_boolean(),
        _ => match placeholder.strip_prefix(REGEX_PREFIX) {
            Some(pattern) => actual
                .as_str()
                .is_some_and(|s| regex_matches(pattern, s, false)),
            // Unknown placeholders compare literally
            None => actual.as_str() == Some(placeholder),
        },
    };
    (!ok).then(|| format!("{path}: {actual} does not satisfy {placeholder}"))
}

fn compare_objects(
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    strict: bool,
    path: &str,
) -> Option<String> {
    for (key, expected_value) in expected {
        let child = format!("{path}.{key}");
        match actual.get(key) {
            Some(actual_value) => {
                if let Some(diff) = compare(expected_value, actual_value, strict, &child) {
                    return Some(diff);
                }
            }
            None if expected_value.as_str() == Some(IGNORE_ELEMENT) => {}
            None => return Some(format!("{child}: missing field")),
        }
    }
    if strict {
        if let Some(extra) = actual.keys().find(|k| !expected.contains_key(*k)) {
            return Some(format!("{path}.{extra}: unexpected field"));
        }
    }
    None
}

fn compare_ordered(expected: &[Value], actual: &[Value], path: &str) -> Option<String> {
    if expected.len() != actual.len() {
        return Some(format!(
            "{path}: expected {} array items but was {}",
            expected.len(),
            actual.len()
        ));
    }
    expected
        .iter()
        .zip(actual)
        .enumerate()
        .find_map(|(i, (e, a))| compare(e, a, true, &format!("{path}[{i}]")))
}

fn compare_unordered(expected: &[Value], actual: &[Value], path: &str) -> Option<String> {
    if expected.len() > actual.len() {
        return Some(format!(
            "{path}: expected at least {} array items but was {}",
            expected.len(),
            actual.len()
        ));
    }
    // Compatibility of every (expected, actual) pair, computed once
    let candidates: Vec<Vec<usize>> = expected
        .iter()
        .map(|item| {
            actual
                .iter()
                .enumerate()
                .filter(|(_, candidate)| compare(item, candidate, false, path).is_none())
                .map(|(j, _)| j)
                .collect()
        })
        .collect();
    if let Some(i) = candidates.iter().position(Vec::is_empty) {
        return Some(format!("{path}: no array item matches {}", expected[i]));
    }

    let mut owner: Vec<Option<usize>> = vec![None; actual.len()];
    for i in 0..expected.len() {
        let mut visited = vec![false; actual.len()];
        if !augment(i, &candidates, &mut owner, &mut visited) {
            return Some(format!("{path}: array items do not match in any order"));
        }
    }
    None
}

/// Kuhn's augmenting path step: give expected item `i` a distinct actual
/// item, reassigning earlier items where that frees one up.
fn augment(
    i: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &j in &candidates[i] {
        if visited[j] {
            continue;
        }
        visited[j] = true;
        let free = match owner[j] {
            None => true,
            Some(previous) => augment(previous, candidates, owner, visited),
        };
        if free {
            owner[j] = Some(i);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::difference::MatchDifferenceField;
    use serde_json::json;

    fn lenient(expected: Value) -> JsonStringMatcher {
        JsonStringMatcher::new(expected, MatchType::OnlyMatchingFields)
    }

    fn strict(expected: Value) -> JsonStringMatcher {
        JsonStringMatcher::new(expected, MatchType::Strict)
    }

    #[test]
    fn test_only_matching_fields_ignores_extras() {
        let matcher = lenient(json!({"id": 1, "tags": ["a", "b"]}));
        assert!(matcher.matches(None, r#"{"id": 1, "name": "x", "tags": ["b", "c", "a"]}"#));
        assert!(!matcher.matches(None, r#"{"id": 2, "tags": ["a", "b"]}"#));
        assert!(!matcher.matches(None, r#"{"id": 1, "tags": ["a"]}"#));
    }

    #[test]
    fn test_strict() {
        let matcher = strict(json!({"id": 1, "tags": ["a", "b"]}));
        assert!(matcher.matches(None, r#"{"tags": ["a", "b"], "id": 1.0}"#));
        assert!(!matcher.matches(None, r#"{"id": 1, "tags": ["b", "a"]}"#));
        assert!(!matcher.matches(None, r#"{"id": 1, "tags": ["a", "b"], "extra": true}"#));
    }

    #[test]
    fn test_expected_as_json_text() {
        let matcher = lenient(json!("{\"id\": 1}"));
        assert!(matcher.matches(None, r#"{"id": 1}"#));
    }

    #[test]
    fn test_placeholders() {
        let matcher = lenient(json!({
            "id": "${json-unit.any-number}",
            "name": "${json-unit.any-string}",
            "flag": "${json-unit.ignore}",
            "note": "${json-unit.ignore-element}",
            "code": "${json-unit.regex}[A-Z]{3}"
        }));
        assert!(matcher.matches(None, r#"{"id": 3, "name": "n", "flag": null, "code": "ABC"}"#));
        assert!(!matcher.matches(None, r#"{"id": "3", "name": "n", "flag": 1, "code": "ABC"}"#));
        assert!(!matcher.matches(None, r#"{"id": 3, "name": "n", "code": "ABC"}"#));
        assert!(!matcher.matches(None, r#"{"id": 3, "name": "n", "flag": 1, "code": "abc"}"#));
    }

    #[test]
    fn test_unordered_assignment_backtracks() {
        let matcher = lenient(json!([{"a": 1}, {"a": 1, "b": 2}]));
        assert!(matcher.matches(None, r#"[{"a": 1, "b": 2}, {"a": 1}]"#));
    }

    #[test]
    fn test_unordered_duplicates_need_distinct_items() {
        let matcher = lenient(json!([1, 1, 2]));
        assert!(matcher.matches(None, "[2, 1, 3, 1]"));
        assert!(!matcher.matches(None, "[1, 2, 2, 2]"));
    }

    #[test]
    fn test_unordered_large_body_stays_fast() {
        let matcher = lenient(json!([1, 1, 1, 1, 1, 2]));
        let ones = format!("[{}]", vec!["1"; 200].join(","));
        let started = std::time::Instant::now();
        assert!(!matcher.matches(None, &ones));
        let with_two = format!("[{},2]", vec!["1"; 200].join(","));
        assert!(matcher.matches(None, &with_two));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_difference_explains_failure() {
        let mut diff = MatchDifference::new();
        diff.set_field(MatchDifferenceField::Body);
        assert!(!lenient(json!({"user": {"id": 1}})).matches(Some(&mut diff), r#"{"user": {}}"#));
        assert!(diff
            .get(MatchDifferenceField::Body)
            .unwrap()
            .contains("$.user.id: missing field"));

        let mut diff = MatchDifference::new();
        diff.set_field(MatchDifferenceField::Body);
        assert!(!lenient(json!({})).matches(Some(&mut diff), "not json"));
        assert!(diff.get(MatchDifferenceField::Body).unwrap().contains("parse"));
    }
}
