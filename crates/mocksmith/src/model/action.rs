//! Actions an expectation performs when it matches.
//!
//! `Action` is a closed sum type; dispatch matches on it exhaustively. The
//! JSON field that carries each variant inside an expectation is given by
//! [`Action::field_name`].

use super::delay::Delay;
use super::http_request::{HttpRequest, Scheme};
use super::http_response::HttpResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Forward the request to another host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpForward {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: Scheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

fn default_port() -> u16 {
    80
}

fn default_scheme() -> Scheme {
    Scheme::Http
}

impl HttpForward {
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
            delay: None,
        }
    }
}

/// Forward with the request and/or the upstream response modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOverrideForwardedRequest {
    #[serde(default, alias = "httpRequest", skip_serializing_if = "Option::is_none")]
    pub request_override: Option<HttpRequest>,
    #[serde(default, alias = "httpResponse", skip_serializing_if = "Option::is_none")]
    pub response_override: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Misbehave at the connection level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_connection: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub response_bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

fn serialize_base64<S: Serializer>(
    bytes: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_base64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded = Option::<String>::deserialize(deserializer)?;
    encoded
        .map(|s| BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
        .transpose()
}

/// Response produced by a callback registered under a client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpObjectCallback {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Response produced by a callback registered under a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClassCallback {
    pub callback_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    Velocity,
    Javascript,
    Mustache,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Velocity => "VELOCITY",
            TemplateType::Javascript => "JAVASCRIPT",
            TemplateType::Mustache => "MUSTACHE",
        }
    }
}

/// Response rendered from a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTemplate {
    pub template_type: TemplateType,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Response(HttpResponse),
    Forward(HttpForward),
    ForwardOverride(HttpOverrideForwardedRequest),
    Error(HttpError),
    ObjectCallback(HttpObjectCallback),
    ClassCallback(HttpClassCallback),
    Template(HttpTemplate),
}

impl Action {
    /// Every JSON field that may carry an action inside an expectation.
    pub const FIELD_NAMES: [&'static str; 7] = [
        "httpResponse",
        "httpForward",
        "httpOverrideForwardedRequest",
        "httpError",
        "httpObjectCallback",
        "httpClassCallback",
        "httpResponseTemplate",
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            Action::Response(_) => "httpResponse",
            Action::Forward(_) => "httpForward",
            Action::ForwardOverride(_) => "httpOverrideForwardedRequest",
            Action::Error(_) => "httpError",
            Action::ObjectCallback(_) => "httpObjectCallback",
            Action::ClassCallback(_) => "httpClassCallback",
            Action::Template(_) => "httpResponseTemplate",
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Response(_) => "response",
            Action::Forward(_) => "forward",
            Action::ForwardOverride(_) => "forward_override",
            Action::Error(_) => "error",
            Action::ObjectCallback(_) => "object_callback",
            Action::ClassCallback(_) => "class_callback",
            Action::Template(_) => "template",
        }
    }

    pub fn delay(&self) -> Option<Delay> {
        match self {
            Action::Response(r) => r.delay,
            Action::Forward(f) => f.delay,
            Action::ForwardOverride(o) => o.delay,
            Action::Error(e) => e.delay,
            Action::ObjectCallback(c) => c.delay,
            Action::ClassCallback(c) => c.delay,
            Action::Template(t) => t.delay,
        }
    }
}
