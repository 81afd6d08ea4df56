//! The expectation entity and its JSON form.
//!
//! ```json
//! {
//!   "id": "...", "priority": 0,
//!   "httpRequest": {...},
//!   "times": {"remainingTimes": 1, "unlimited": false},
//!   "timeToLive": {"timeUnit": "SECONDS", "timeToLive": 60, "unlimited": false},
//!   "httpResponse": {...}
//! }
//! ```
//!
//! Exactly one of the action fields (`httpResponse`, `httpForward`,
//! `httpOverrideForwardedRequest`, `httpError`, `httpObjectCallback`,
//! `httpClassCallback`, `httpResponseTemplate`) is present.

use super::times::Times;
use super::ttl::TimeToLive;
use crate::model::{
    Action, HttpClassCallback, HttpError, HttpForward, HttpObjectCallback,
    HttpOverrideForwardedRequest, HttpRequest, HttpResponse, HttpTemplate,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A request matcher paired with one action and scheduling metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Empty until assigned by the caller or the store.
    pub id: String,
    pub priority: i32,
    pub http_request: HttpRequest,
    pub times: Times,
    pub time_to_live: TimeToLive,
    pub action: Action,
}

impl Expectation {
    pub fn new(http_request: HttpRequest, action: Action) -> Self {
        Self {
            id: String::new(),
            priority: 0,
            http_request,
            times: Times::unlimited(),
            time_to_live: TimeToLive::unlimited(),
            action,
        }
    }

    /// Start an expectation that answers `http_request` with an empty 200.
    pub fn when(http_request: HttpRequest) -> Self {
        Self::new(http_request, Action::Response(HttpResponse::default()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_times(mut self, times: Times) -> Self {
        self.times = times;
        self
    }

    pub fn with_time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    pub fn then_respond(mut self, response: HttpResponse) -> Self {
        self.action = Action::Response(response);
        self
    }

    pub fn then_forward(mut self, forward: HttpForward) -> Self {
        self.action = Action::Forward(forward);
        self
    }

    pub fn then_forward_with_overrides(mut self, overrides: HttpOverrideForwardedRequest) -> Self {
        self.action = Action::ForwardOverride(overrides);
        self
    }

    pub fn then_error(mut self, error: HttpError) -> Self {
        self.action = Action::Error(error);
        self
    }

    pub fn then_callback_object(mut self, callback: HttpObjectCallback) -> Self {
        self.action = Action::ObjectCallback(callback);
        self
    }

    pub fn then_callback_class(mut self, callback: HttpClassCallback) -> Self {
        self.action = Action::ClassCallback(callback);
        self
    }

    pub fn then_template(mut self, template: HttpTemplate) -> Self {
        self.action = Action::Template(template);
        self
    }
}

/// Wire form; every field optional so that validation can report omissions.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExpectationRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Times>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<TimeToLive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward: Option<HttpForward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_override_forwarded_request: Option<HttpOverrideForwardedRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error: Option<HttpError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_object_callback: Option<HttpObjectCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_class_callback: Option<HttpClassCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_template: Option<HttpTemplate>,
}

impl ExpectationRepr {
    /// Every populated action, in field order.
    pub(crate) fn actions(self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(a) = self.http_response {
            actions.push(Action::Response(a));
        }
        if let Some(a) = self.http_forward {
            actions.push(Action::Forward(a));
        }
        if let Some(a) = self.http_override_forwarded_request {
            actions.push(Action::ForwardOverride(a));
        }
        if let Some(a) = self.http_error {
            actions.push(Action::Error(a));
        }
        if let Some(a) = self.http_object_callback {
            actions.push(Action::ObjectCallback(a));
        }
        if let Some(a) = self.http_class_callback {
            actions.push(Action::ClassCallback(a));
        }
        if let Some(a) = self.http_response_template {
            actions.push(Action::Template(a));
        }
        actions
    }
}

impl TryFrom<ExpectationRepr> for Expectation {
    type Error = String;

    fn try_from(mut repr: ExpectationRepr) -> Result<Self, Self::Error> {
        let id = repr.id.take().unwrap_or_default();
        let priority = repr.priority.take().unwrap_or(0);
        let http_request = repr.http_request.take().unwrap_or_default();
        let times = repr.times.take().unwrap_or_default();
        let time_to_live = repr.time_to_live.take().unwrap_or_default();

        let mut actions = repr.actions();
        if actions.len() != 1 {
            return Err(format!(
                "expectation must have exactly one action, found {}",
                actions.len()
            ));
        }
        let action = actions.remove(0);

        Ok(Expectation {
            id,
            priority,
            http_request,
            times,
            time_to_live,
            action,
        })
    }
}

impl From<&Expectation> for ExpectationRepr {
    fn from(expectation: &Expectation) -> Self {
        let mut repr = ExpectationRepr {
            id: (!expectation.id.is_empty()).then(|| expectation.id.clone()),
            priority: Some(expectation.priority),
            http_request: Some(expectation.http_request.clone()),
            times: Some(expectation.times),
            time_to_live: Some(expectation.time_to_live),
            ..Default::default()
        };
        match expectation.action.clone() {
            Action::Response(a) => repr.http_response = Some(a),
            Action::Forward(a) => repr.http_forward = Some(a),
            Action::ForwardOverride(a) => repr.http_override_forwarded_request = Some(a),
            Action::Error(a) => repr.http_error = Some(a),
            Action::ObjectCallback(a) => repr.http_object_callback = Some(a),
            Action::ClassCallback(a) => repr.http_class_callback = Some(a),
            Action::Template(a) => repr.http_response_template = Some(a),
        }
        repr
    }
}

impl Serialize for Expectation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ExpectationRepr::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expectation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ExpectationRepr::deserialize(deserializer)?;
        Expectation::try_from(repr).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{request, response, Body, Scheme};
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let expectation = Expectation::when(request().with_path("/a"));
        assert!(expectation.id.is_empty());
        assert_eq!(expectation.priority, 0);
        assert!(expectation.times.is_unlimited());
        assert!(expectation.time_to_live.is_unlimited());
        assert_eq!(expectation.action.kind(), "response");
    }

    #[test]
    fn test_json_shape() {
        let expectation = Expectation::when(request().with_method("GET").with_path("/a"))
            .with_id("one")
            .with_priority(10)
            .with_times(Times::exactly(2))
            .then_respond(response().with_status_code(201).with_body(Body::exact("ok")));

        let value = serde_json::to_value(&expectation).unwrap();
        assert_eq!(value["id"], "one");
        assert_eq!(value["priority"], 10);
        assert_eq!(value["httpRequest"]["path"], "/a");
        assert_eq!(value["times"], json!({"remainingTimes": 2, "unlimited": false}));
        assert_eq!(value["timeToLive"], json!({"unlimited": true}));
        assert_eq!(value["httpResponse"]["statusCode"], 201);

        let parsed: Expectation = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, expectation);
    }

    #[test]
    fn test_forward_from_json() {
        let parsed: Expectation = serde_json::from_value(json!({
            "httpRequest": {"path": "/proxy"},
            "httpForward": {"host": "upstream", "port": 8443, "scheme": "HTTPS"}
        }))
        .unwrap();
        assert_eq!(
            parsed.action,
            Action::Forward(HttpForward::new("upstream", 8443, Scheme::Https))
        );
    }

    #[test]
    fn test_action_count_enforced() {
        let none = serde_json::from_value::<Expectation>(json!({"httpRequest": {}}));
        assert!(none.is_err());
        let two = serde_json::from_value::<Expectation>(json!({
            "httpResponse": {},
            "httpError": {"dropConnection": true}
        }));
        assert!(two.is_err());
    }
}
