//! HTTP response returned by a `Response` action or produced by forwarding.

use super::body::Body;
use super::delay::Delay;
use super::keys::{Cookies, Headers, KeysToMultiValues};
use super::nottable::NottableString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Cookies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Response with no fields set; sent as `200 OK`.
pub fn response() -> HttpResponse {
    HttpResponse::default()
}

impl HttpResponse {
    pub fn not_found() -> Self {
        response()
            .with_status_code(404)
            .with_reason_phrase("Not Found")
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_reason_phrase(mut self, reason_phrase: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason_phrase.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(KeysToMultiValues::new)
            .add(NottableString::string(name), [NottableString::string(value)]);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let cookies = self.cookies.take().unwrap_or_default();
        self.cookies = Some(
            cookies.with_entry(NottableString::string(name), NottableString::string(value)),
        );
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Effective status code.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(200)
    }

    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.first_value(name, true))
    }

    /// Copy of `self` with every field present in `overrides` replacing ours.
    ///
    /// Headers and cookies are merged by name, the override's entries win.
    pub fn with_overrides(&self, overrides: &HttpResponse) -> HttpResponse {
        let mut merged = self.clone();
        if overrides.status_code.is_some() {
            merged.status_code = overrides.status_code;
        }
        if overrides.reason_phrase.is_some() {
            merged.reason_phrase = overrides.reason_phrase.clone();
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
        if overrides.delay.is_some() {
            merged.delay = overrides.delay;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_json() {
        let resp = response()
            .with_status_code(201)
            .with_header("Location", "/carts/1")
            .with_body(Body::exact("created"))
            .with_delay(Delay::millis(5));

        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "statusCode": 201,
                "headers": {"Location": ["/carts/1"]},
                "body": "created",
                "delay": {"timeUnit": "MILLISECONDS", "value": 5}
            })
        );
    }

    #[test]
    fn test_default_status() {
        assert_eq!(response().status(), 200);
        assert_eq!(HttpResponse::not_found().status(), 404);
    }

    #[test]
    fn test_overrides() {
        let upstream = response()
            .with_status_code(200)
            .with_header("Server", "upstream")
            .with_body(Body::exact("original"));
        let overrides = response().with_header("server", "mock").with_status_code(202);

        let merged = upstream.with_overrides(&overrides);
        assert_eq!(merged.status(), 202);
        assert_eq!(merged.first_header("Server"), Some("mock"));
        assert_eq!(merged.body, Some(Body::exact("original")));
    }
}
