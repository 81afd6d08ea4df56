//! HTTP request: both the matcher inside an expectation and the inbound request.
//!
//! Absent fields (`None`) place no constraint when the request is used as a
//! matcher. The top-level `not` negates the whole match.

use super::body::Body;
use super::keys::{Cookies, Headers, KeysToMultiValues, Parameters};
use super::nottable::NottableString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Host/port/scheme a request was addressed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,
}

impl SocketAddress {
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            scheme: Some(scheme),
        }
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default, skip_serializing_if = "is_false")]
    pub not: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<NottableString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<NottableString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<Parameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<Parameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Cookies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_address: Option<SocketAddress>,
}

/// Empty request: as a matcher it matches every request.
pub fn request() -> HttpRequest {
    HttpRequest::default()
}

impl HttpRequest {
    pub fn negate(mut self) -> Self {
        self.not = !self.not;
        self
    }

    pub fn with_method(mut self, method: impl Into<NottableString>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<NottableString>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_path_parameter(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = NottableString>,
    ) -> Self {
        self.path_parameters
            .get_or_insert_with(KeysToMultiValues::new)
            .add(name, values);
        self
    }

    pub fn with_path_parameters(mut self, parameters: Parameters) -> Self {
        self.path_parameters = Some(parameters);
        self
    }

    pub fn with_query_string_parameter(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = NottableString>,
    ) -> Self {
        self.query_string_parameters
            .get_or_insert_with(KeysToMultiValues::new)
            .add(name, values);
        self
    }

    pub fn with_query_string_parameters(mut self, parameters: Parameters) -> Self {
        self.query_string_parameters = Some(parameters);
        self
    }

    /// Add a header with one value.
    pub fn with_header(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.headers
            .get_or_insert_with(KeysToMultiValues::new)
            .add(name, [value.into()]);
        self
    }

    /// Add a header constrained on its name only.
    pub fn with_header_name(mut self, name: impl Into<NottableString>) -> Self {
        self.headers
            .get_or_insert_with(KeysToMultiValues::new)
            .add(name, Vec::<NottableString>::new());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_cookie(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        let cookies = self.cookies.take().unwrap_or_default();
        self.cookies = Some(cookies.with_entry(name, value));
        self
    }

    pub fn with_cookies(mut self, cookies: Cookies) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn with_socket_address(mut self, socket_address: SocketAddress) -> Self {
        self.socket_address = Some(socket_address);
        self
    }

    /// Method as plain text, empty when absent.
    pub fn method_str(&self) -> &str {
        self.method.as_ref().map(|m| m.value()).unwrap_or("")
    }

    /// Path as plain text, empty when absent.
    pub fn path_str(&self) -> &str {
        self.path.as_ref().map(|p| p.value()).unwrap_or("")
    }

    /// First value of a header, compared case-insensitively.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.first_value(name, true))
    }

    /// Value of the `Content-Type` header, or the body's own content type.
    pub fn content_type(&self) -> Option<&str> {
        self.first_header("content-type").or_else(|| {
            self.body
                .as_ref()
                .and_then(|b| b.content_type.as_deref())
        })
    }

    /// True when no field is constrained.
    pub fn is_blank(&self) -> bool {
        self.method.as_ref().is_none_or(|m| m.is_blank())
            && self.path.as_ref().is_none_or(|p| p.is_blank())
            && self.path_parameters.as_ref().is_none_or(|p| p.is_empty())
            && self
                .query_string_parameters
                .as_ref()
                .is_none_or(|p| p.is_empty())
            && self.headers.as_ref().is_none_or(|h| h.is_empty())
            && self.cookies.as_ref().is_none_or(|c| c.is_empty())
            && self.body.is_none()
            && self.secure.is_none()
            && self.keep_alive.is_none()
            && self.socket_address.is_none()
    }

    /// Copy of `self` with every field present in `overrides` replacing ours.
    ///
    /// Headers and cookies are merged by name, the override's entries win.
    pub fn with_overrides(&self, overrides: &HttpRequest) -> HttpRequest {
        let mut merged = self.clone();
        if overrides.method.is_some() {
            merged.method = overrides.method.clone();
        }
        if overrides.path.is_some() {
            merged.path = overrides.path.clone();
        }
        if overrides.path_parameters.is_some() {
            merged.path_parameters = overrides.path_parameters.clone();
        }
        if overrides.query_string_parameters.is_some() {
            merged.query_string_parameters = overrides.query_string_parameters.clone();
        }
        if let Some(headers) = &overrides.headers {
            let mut base = merged.headers.take().unwrap_or_default();
            for entry in &headers.entries {
                base.entries
                    .retain(|e| !e.name.value().eq_ignore_ascii_case(entry.name.value()));
                base.entries.push(entry.clone());
            }
            merged.headers = Some(base);
        }
        if let Some(cookies) = &overrides.cookies {
            let mut base = merged.cookies.take().unwrap_or_default();
            for entry in &cookies.entries {
                base.entries.retain(|e| e.name.value() != entry.name.value());
                base.entries.push(entry.clone());
            }
            merged.cookies = Some(base);
        }
        if overrides.body.is_some() {
            merged.body = overrides.body.clone();
        }
        if overrides.secure.is_some() {
            merged.secure = overrides.secure;
        }
        if overrides.keep_alive.is_some() {
            merged.keep_alive = overrides.keep_alive;
        }
        if overrides.socket_address.is_some() {
            merged.socket_address = overrides.socket_address.clone();
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::nottable::{not, string};
    use serde_json::json;

    #[test]
    fn test_builder_and_json_shape() {
        let req = request()
            .with_method(not("GET"))
            .with_path("/some/path")
            .with_header("Accept", "application/json")
            .with_query_string_parameter("cartId", vec![string("055CA455")])
            .with_keep_alive(true);

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "!GET",
                "path": "/some/path",
                "queryStringParameters": {"cartId": ["055CA455"]},
                "headers": {"Accept": ["application/json"]},
                "keepAlive": true
            })
        );

        let decoded: HttpRequest = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_blank_request() {
        assert!(request().is_blank());
        assert!(request().with_path("").is_blank());
        assert!(!request().with_secure(false).is_blank());
    }

    #[test]
    fn test_content_type_from_header_or_body() {
        let req = request().with_header("Content-Type", "application/json; charset=utf-8");
        assert_eq!(req.content_type(), Some("application/json; charset=utf-8"));

        let req = request().with_body(Body::exact("x").with_content_type("text/plain"));
        assert_eq!(req.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_overrides_merge_headers() {
        let inbound = request()
            .with_path("/a")
            .with_header("Host", "localhost")
            .with_header("X-Keep", "1");
        let overrides = request().with_path("/b").with_header("host", "upstream");

        let merged = inbound.with_overrides(&overrides);
        assert_eq!(merged.path_str(), "/b");
        assert_eq!(merged.first_header("host"), Some("upstream"));
        assert_eq!(merged.first_header("x-keep"), Some("1"));
    }
}
