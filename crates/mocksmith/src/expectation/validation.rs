//! Expectation validation.
//!
//! Every violation is collected, not just the first, each with the JSON path
//! of the offending field (`httpRequest.headers`, `[1].times.remainingTimes`).
//! An expectation with any violation is never stored.

use super::model::Expectation;
use super::ttl::TimeToLive;
use crate::matchers::{JsonSchemaValidator, XmlSchemaValidator};
use crate::model::nottable::json_kind as kind;
use crate::model::{
    Action, Body, BodyKind, Cookies, HttpClassCallback, HttpError, HttpForward,
    HttpObjectCallback, HttpOverrideForwardedRequest, HttpRequest, HttpResponse, HttpTemplate,
    KeysToMultiValues, NottableString, SocketAddress, TimeUnit,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const EXPECTATION_FIELDS: [&str; 5] = ["id", "priority", "httpRequest", "times", "timeToLive"];

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}{}", path_prefix(.path), .message)]
pub struct ValidationError {
    /// JSON path of the field, empty for the expectation itself.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn path_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}: ")
    }
}

/// All violations found in one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("{}", summary(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn summary(errors: &[ValidationError]) -> String {
    let mut text = format!("incorrect expectation format, {} error(s):", errors.len());
    for error in errors {
        text.push_str(&format!("\n - {error}"));
    }
    text
}

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError::new(path, message));
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

pub struct ExpectationValidator;

impl ExpectationValidator {
    /// Semantic checks on an already typed expectation.
    pub fn validate(expectation: &Expectation) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        request_errors(&expectation.http_request, "httpRequest", &mut errors);
        ttl_errors(&expectation.time_to_live, "timeToLive", &mut errors);
        action_errors(
            &expectation.action,
            expectation.action.field_name(),
            &mut errors,
        );
        errors.into_result(())
    }

    /// Validate and decode one expectation object.
    pub fn validate_json(value: &Value) -> Result<Expectation, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let expectation = check_expectation(value, "", &mut errors);
        match expectation {
            Some(expectation) if errors.is_empty() => Ok(expectation),
            _ => Err(errors),
        }
    }

    /// Validate and decode an expectation object or an array of them.
    ///
    /// Returns every expectation only when all of them are valid.
    pub fn validate_json_batch(value: &Value) -> Result<Vec<Expectation>, ValidationErrors> {
        let Value::Array(items) = value else {
            return Self::validate_json(value).map(|e| vec![e]);
        };
        let mut errors = ValidationErrors::default();
        let mut expectations = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(expectation) = check_expectation(item, &format!("[{i}]"), &mut errors) {
                expectations.push(expectation);
            }
        }
        errors.into_result(expectations)
    }
}

/// Decode `value` as `T`, recording the decoder's message on failure.
fn decode<T: DeserializeOwned>(value: &Value, path: &str, errors: &mut ValidationErrors) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            errors.push(path, e.to_string());
            None
        }
    }
}

fn check_expectation(value: &Value, prefix: &str, errors: &mut ValidationErrors) -> Option<Expectation> {
    let Value::Object(fields) = value else {
        errors.push(prefix, format!("expectation must be a JSON object, found {}", kind(value)));
        return None;
    };
    let before = errors.len();

    for key in fields.keys() {
        if !EXPECTATION_FIELDS.contains(&key.as_str()) && !Action::FIELD_NAMES.contains(&key.as_str()) {
            errors.push(join(prefix, key), "unknown field");
        }
    }

    if let Some(id) = fields.get("id") {
        if !id.is_string() {
            errors.push(join(prefix, "id"), format!("must be a string, found {}", kind(id)));
        }
    }
    if let Some(priority) = fields.get("priority") {
        if priority.as_i64().and_then(|p| i32::try_from(p).ok()).is_none() {
            errors.push(join(prefix, "priority"), format!("must be a 32-bit integer, found {priority}"));
        }
    }
    if let Some(request) = fields.get("httpRequest") {
        check_request(request, &join(prefix, "httpRequest"), errors);
    }
    if let Some(times) = fields.get("times") {
        check_times(times, &join(prefix, "times"), errors);
    }
    if let Some(ttl) = fields.get("timeToLive") {
        check_time_to_live(ttl, &join(prefix, "timeToLive"), errors);
    }
    check_actions(fields, prefix, errors);

    if errors.len() > before {
        return None;
    }
    match serde_json::from_value::<Expectation>(value.clone()) {
        Ok(expectation) => Some(expectation),
        Err(e) => {
            errors.push(prefix, e.to_string());
            None
        }
    }
}

fn check_request(value: &Value, path: &str, errors: &mut ValidationErrors) {
    let Value::Object(fields) = value else {
        errors.push(path, format!("must be an object, found {}", kind(value)));
        return;
    };
    let before = errors.len();
    for (key, field) in fields {
        let field_path = join(path, key);
        let result = match key.as_str() {
            "method" | "path" => NottableString::from_json(field).map(|_| ()),
            "pathParameters" | "queryStringParameters" | "headers" => {
                KeysToMultiValues::from_json(field).map(|_| ())
            }
            "cookies" => Cookies::from_json(field).map(|_| ()),
            "body" => Body::from_json(field).map(|_| ()),
            "secure" | "keepAlive" | "not" => {
                if field.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("must be a boolean, found {}", kind(field)))
                }
            }
            "socketAddress" => serde_json::from_value::<SocketAddress>(field.clone())
                .map(|_| ())
                .map_err(|e| e.to_string()),
            _ => Err("unknown field".to_string()),
        };
        if let Err(message) = result {
            errors.push(field_path, message);
        }
    }
    if errors.len() > before {
        return;
    }
    if let Some(request) = decode::<HttpRequest>(value, path, errors) {
        request_errors(&request, path, errors);
    }
}

fn check_times(value: &Value, path: &str, errors: &mut ValidationErrors) {
    let Value::Object(fields) = value else {
        errors.push(path, format!("must be an object, found {}", kind(value)));
        return;
    };
    for (key, field) in fields {
        match key.as_str() {
            "remainingTimes" => {
                if field.as_u64().and_then(|n| u32::try_from(n).ok()).is_none() {
                    errors.push(
                        join(path, key),
                        format!("must be a non-negative integer, found {field}"),
                    );
                }
            }
            "unlimited" => {
                if !field.is_boolean() {
                    errors.push(join(path, key), format!("must be a boolean, found {}", kind(field)));
                }
            }
            _ => errors.push(join(path, key), "unknown field"),
        }
    }
}

fn check_time_to_live(value: &Value, path: &str, errors: &mut ValidationErrors) {
    let Value::Object(fields) = value else {
        errors.push(path, format!("must be an object, found {}", kind(value)));
        return;
    };
    let before = errors.len();
    for (key, field) in fields {
        match key.as_str() {
            "timeUnit" => {
                if serde_json::from_value::<TimeUnit>(field.clone()).is_err() {
                    errors.push(
                        join(path, key),
                        format!("must be one of NANOSECONDS, MICROSECONDS, MILLISECONDS, SECONDS, MINUTES, HOURS, DAYS, found {field}"),
                    );
                }
            }
            "timeToLive" => {
                if field.as_u64().is_none() {
                    errors.push(
                        join(path, key),
                        format!("must be a non-negative integer, found {field}"),
                    );
                }
            }
            "unlimited" => {
                if !field.is_boolean() {
                    errors.push(join(path, key), format!("must be a boolean, found {}", kind(field)));
                }
            }
            _ => errors.push(join(path, key), "unknown field"),
        }
    }
    if errors.len() > before {
        return;
    }
    if let Some(ttl) = decode::<TimeToLive>(value, path, errors) {
        ttl_errors(&ttl, path, errors);
    }
}

fn check_actions(fields: &Map<String, Value>, prefix: &str, errors: &mut ValidationErrors) {
    let present: Vec<&str> = Action::FIELD_NAMES
        .iter()
        .copied()
        .filter(|name| fields.contains_key(*name))
        .collect();
    match present.len() {
        0 => errors.push(
            prefix,
            format!(
                "expectation must have exactly one action of {}, found none",
                Action::FIELD_NAMES.join(", ")
            ),
        ),
        1 => {}
        _ => errors.push(
            prefix,
            format!(
                "expectation must have exactly one action, found {}",
                present.join(", ")
            ),
        ),
    }

    for name in present {
        let path = join(prefix, name);
        let value = &fields[name];
        if !value.is_object() {
            errors.push(&path, format!("must be an object, found {}", kind(value)));
            continue;
        }
        let action = match name {
            "httpResponse" => check_response(value, &path, errors).map(Action::Response),
            "httpForward" => decode::<HttpForward>(value, &path, errors).map(Action::Forward),
            "httpOverrideForwardedRequest" => {
                decode::<HttpOverrideForwardedRequest>(value, &path, errors).map(Action::ForwardOverride)
            }
            "httpError" => decode::<HttpError>(value, &path, errors).map(Action::Error),
            "httpObjectCallback" => {
                decode::<HttpObjectCallback>(value, &path, errors).map(Action::ObjectCallback)
            }
            "httpClassCallback" => {
                decode::<HttpClassCallback>(value, &path, errors).map(Action::ClassCallback)
            }
            _ => decode::<HttpTemplate>(value, &path, errors).map(Action::Template),
        };
        if let Some(action) = action {
            action_errors(&action, &path, errors);
        }
    }
}

fn check_response(value: &Value, path: &str, errors: &mut ValidationErrors) -> Option<HttpResponse> {
    let before = errors.len();
    if let Some(body) = value.get("body") {
        if let Err(message) = Body::from_json(body) {
            errors.push(join(path, "body"), message);
        }
    }
    if let Some(field) = value.get("headers") {
        if let Err(message) = KeysToMultiValues::from_json(field) {
            errors.push(join(path, "headers"), message);
        }
    }
    if let Some(field) = value.get("cookies") {
        if let Err(message) = Cookies::from_json(field) {
            errors.push(join(path, "cookies"), message);
        }
    }
    if errors.len() > before {
        return None;
    }
    decode::<HttpResponse>(value, path, errors)
}

fn request_errors(request: &HttpRequest, path: &str, errors: &mut ValidationErrors) {
    let mut strings: Vec<(String, &NottableString)> = Vec::new();
    if let Some(method) = &request.method {
        strings.push((join(path, "method"), method));
    }
    if let Some(p) = &request.path {
        strings.push((join(path, "path"), p));
    }
    for (field, collection) in [
        ("pathParameters", &request.path_parameters),
        ("queryStringParameters", &request.query_string_parameters),
        ("headers", &request.headers),
    ] {
        if let Some(collection) = collection {
            for entry in &collection.entries {
                let entry_path = join(&join(path, field), entry.name.value());
                for value in &entry.values {
                    strings.push((entry_path.clone(), value));
                }
            }
        }
    }
    if let Some(cookies) = &request.cookies {
        for entry in &cookies.entries {
            strings.push((join(&join(path, "cookies"), entry.name.value()), &entry.value));
        }
    }
    for (string_path, value) in strings {
        if !value.is_schema() {
            continue;
        }
        match value.schema_value() {
            Some(schema) => {
                if let Err(message) = JsonSchemaValidator::new(&schema) {
                    errors.push(string_path, message);
                }
            }
            None => errors.push(string_path, "schema is not valid JSON"),
        }
    }

    if let Some(body) = &request.body {
        let body_path = join(path, "body");
        match &body.kind {
            BodyKind::JsonSchema(schema) => {
                if let Err(message) = JsonSchemaValidator::new(schema) {
                    errors.push(body_path, message);
                }
            }
            BodyKind::XmlSchema(schema) => {
                if let Err(message) = XmlSchemaValidator::new(schema) {
                    errors.push(body_path, message);
                }
            }
            _ => {}
        }
    }
}

fn ttl_errors(ttl: &TimeToLive, path: &str, errors: &mut ValidationErrors) {
    if !ttl.is_unlimited() && ttl.time_to_live().is_none() {
        errors.push(path, "timeToLive is required when unlimited is false");
    }
}

fn action_errors(action: &Action, path: &str, errors: &mut ValidationErrors) {
    match action {
        Action::Response(response) => {
            if let Some(status) = response.status_code {
                if !(100..=599).contains(&status) {
                    errors.push(join(path, "statusCode"), format!("must be between 100 and 599, found {status}"));
                }
            }
        }
        Action::Forward(forward) => {
            if forward.host.trim().is_empty() {
                errors.push(join(path, "host"), "must not be empty");
            }
            if forward.port == 0 {
                errors.push(join(path, "port"), "must be between 1 and 65535");
            }
        }
        Action::ForwardOverride(overrides) => {
            if let Some(request) = &overrides.request_override {
                request_errors(request, &join(path, "requestOverride"), errors);
            }
        }
        Action::Error(_) => {}
        Action::ObjectCallback(callback) => {
            if callback.client_id.trim().is_empty() {
                errors.push(join(path, "clientId"), "must not be empty");
            }
        }
        Action::ClassCallback(callback) => {
            if callback.callback_class.trim().is_empty() {
                errors.push(join(path, "callbackClass"), "must not be empty");
            }
        }
        Action::Template(template) => {
            if template.template.trim().is_empty() {
                errors.push(join(path, "template"), "must not be empty");
            }
        }
    }
}
