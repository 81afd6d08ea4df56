//! Composite request matcher.
//!
//! Combines the field matchers into one full-request matcher. Fields are
//! evaluated in a fixed order; without a [`MatchDifference`] the first
//! mismatching field ends evaluation, with one every field is evaluated so
//! that each mismatch is recorded.
//!
//! A path such as `/cart/{cartId}/items` is a template: in the data plane the
//! named segments are extracted from the request path and matched with the
//! `pathParameters` matcher.

use super::body::BodyMatcher;
use super::boolean::BooleanMatcher;
use super::difference::{MatchDifference, MatchDifferenceField};
use super::multi_value::{HashMapMatcher, MultiValueMapMatcher};
use super::regex_string::RegexStringMatcher;
use crate::model::{string, HttpRequest, Parameters, SocketAddress};
use once_cell::sync::Lazy;
use regex::Regex;

static PATH_TEMPLATE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

const FIELD_ORDER: [MatchDifferenceField; 10] = [
    MatchDifferenceField::Method,
    MatchDifferenceField::Path,
    MatchDifferenceField::PathParameters,
    MatchDifferenceField::QueryStringParameters,
    MatchDifferenceField::Cookies,
    MatchDifferenceField::Headers,
    MatchDifferenceField::Body,
    MatchDifferenceField::Secure,
    MatchDifferenceField::KeepAlive,
    MatchDifferenceField::SocketAddress,
];

/// Compiled `{name}` path template.
#[derive(Debug, Clone)]
struct PathTemplate {
    regex: Regex,
    names: Vec<String>,
}

impl PathTemplate {
    fn compile(path: &str) -> Option<Self> {
        if !PATH_TEMPLATE_SEGMENT.is_match(path) {
            return None;
        }
        let names = PATH_TEMPLATE_SEGMENT
            .captures_iter(path)
            .map(|c| c[1].to_string())
            .collect();
        let pattern = PATH_TEMPLATE_SEGMENT.replace_all(path, "(?P<$1>[^/]+)");
        Regex::new(&format!("^(?:{pattern})$"))
            .map(|regex| PathTemplate { regex, names })
            .ok()
    }

    fn extract(&self, path: &str) -> Option<Parameters> {
        let captures = self.regex.captures(path)?;
        let mut parameters = Parameters::new();
        for name in &self.names {
            if let Some(value) = captures.name(name) {
                parameters.add(string(name), [string(value.as_str())]);
            }
        }
        Some(parameters)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequestPropertiesMatcher {
    request: HttpRequest,
    control_plane: bool,
    method: RegexStringMatcher,
    path: RegexStringMatcher,
    path_template: Option<PathTemplate>,
    path_parameters: MultiValueMapMatcher,
    query_string_parameters: MultiValueMapMatcher,
    cookies: HashMapMatcher,
    headers: MultiValueMapMatcher,
    body: BodyMatcher,
    secure: BooleanMatcher,
    keep_alive: BooleanMatcher,
}

impl HttpRequestPropertiesMatcher {
    /// Matcher for live traffic.
    pub fn data_plane(request: &HttpRequest) -> Self {
        Self::build(request, false)
    }

    /// Matcher for administrative filters, where the matched side is itself
    /// a request matcher.
    pub fn control_plane(request: &HttpRequest) -> Self {
        Self::build(request, true)
    }

    fn build(request: &HttpRequest, control_plane: bool) -> Self {
        let path_template = request
            .path
            .as_ref()
            .filter(|p| !p.is_schema())
            .and_then(|p| PathTemplate::compile(p.value()));
        Self {
            request: request.clone(),
            control_plane,
            method: RegexStringMatcher::new(request.method.clone(), control_plane),
            path: RegexStringMatcher::new(request.path.clone(), control_plane),
            path_template,
            path_parameters: MultiValueMapMatcher::new(
                request.path_parameters.clone(),
                control_plane,
                false,
            ),
            query_string_parameters: MultiValueMapMatcher::new(
                request.query_string_parameters.clone(),
                control_plane,
                false,
            ),
            cookies: HashMapMatcher::new(request.cookies.clone(), control_plane),
            headers: MultiValueMapMatcher::new(request.headers.clone(), control_plane, true),
            body: BodyMatcher::new(request.body.clone(), control_plane),
            secure: BooleanMatcher::new(request.secure),
            keep_alive: BooleanMatcher::new(request.keep_alive),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn is_control_plane(&self) -> bool {
        self.control_plane
    }

    /// A blank matcher matches every request.
    pub fn is_blank(&self) -> bool {
        !self.request.not && self.request.is_blank()
    }

    pub fn matches(&self, mut context: Option<&mut MatchDifference>, matched: &HttpRequest) -> bool {
        if self.is_blank() {
            return true;
        }

        let short_circuit = context.is_none();
        let mut result = true;
        let mut extracted: Option<Parameters> = None;

        for field in FIELD_ORDER {
            if !result && short_circuit {
                break;
            }
            let ctx = context.as_deref_mut().map(|c| {
                c.set_field(field);
                c
            });
            let field_matches = match field {
                MatchDifferenceField::Method => self.method.matches(ctx, matched.method.as_ref()),
                MatchDifferenceField::Path => {
                    let (ok, parameters) = self.path_matches(ctx, matched);
                    extracted = parameters;
                    ok
                }
                MatchDifferenceField::PathParameters => self
                    .path_parameters
                    .matches(ctx, extracted.as_ref().or(matched.path_parameters.as_ref())),
                MatchDifferenceField::QueryStringParameters => self
                    .query_string_parameters
                    .matches(ctx, matched.query_string_parameters.as_ref()),
                MatchDifferenceField::Cookies => self.cookies.matches(ctx, matched.cookies.as_ref()),
                MatchDifferenceField::Headers => self.headers.matches(ctx, matched.headers.as_ref()),
                MatchDifferenceField::Body => {
                    self.body
                        .matches(ctx, matched.body.as_ref(), matched.content_type())
                }
                MatchDifferenceField::Secure => self.secure.matches(ctx, matched.secure),
                MatchDifferenceField::KeepAlive => self.keep_alive.matches(ctx, matched.keep_alive),
                MatchDifferenceField::SocketAddress => self.socket_address_matches(
                    ctx,
                    matched.socket_address.as_ref(),
                ),
            };
            result &= field_matches;
        }

        let negated = self.request.not ^ (self.control_plane && matched.not);
        negated ^ result
    }

    /// Path result plus any parameters extracted from a path template.
    fn path_matches(
        &self,
        context: Option<&mut MatchDifference>,
        matched: &HttpRequest,
    ) -> (bool, Option<Parameters>) {
        if let (Some(template), false) = (&self.path_template, self.control_plane) {
            if let Some(parameters) = matched.path.as_ref().and_then(|p| template.extract(p.value())) {
                let not = self.request.path.as_ref().is_some_and(|p| p.is_not());
                return (!not, Some(parameters));
            }
        }
        (self.path.matches(context, matched.path.as_ref()), None)
    }

    fn socket_address_matches(
        &self,
        context: Option<&mut MatchDifference>,
        matched: Option<&SocketAddress>,
    ) -> bool {
        let Some(expected) = &self.request.socket_address else {
            return true;
        };
        let host_ok = expected.host.as_ref().is_none_or(|host| {
            matched.and_then(|m| m.host.as_deref()).is_some_and(|actual| {
                self.path
                    .matches_values(host, actual, true)
            })
        });
        let port_ok = expected
            .port
            .is_none_or(|port| matched.and_then(|m| m.port) == Some(port));
        let scheme_ok = expected
            .scheme
            .is_none_or(|scheme| matched.and_then(|m| m.scheme) == Some(scheme));

        let ok = host_ok && port_ok && scheme_ok;
        if !ok {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "socket address match failed expected:\n  {:?}\n found:\n  {:?}",
                    expected, matched
                ));
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{not, request, Body, Cookies, Scheme};
    use serde_json::json;

    fn matches(matcher: &HttpRequest, matched: &HttpRequest) -> bool {
        HttpRequestPropertiesMatcher::data_plane(matcher).matches(None, matched)
    }

    #[test]
    fn test_blank_request_matches_everything() {
        assert!(matches(&request(), &request().with_method("GET").with_path("/x")));
        assert!(HttpRequestPropertiesMatcher::data_plane(&request()).is_blank());
    }

    #[test]
    fn test_method_and_path() {
        let matcher = request().with_method("GET").with_path("/some/path");
        assert!(matches(&matcher, &request().with_method("GET").with_path("/some/path")));
        assert!(!matches(&matcher, &request().with_method("POST").with_path("/some/path")));
        assert!(!matches(&matcher, &request().with_method("GET").with_path("/other")));
    }

    #[test]
    fn test_not_accept_header() {
        let matcher = request().with_path("/some/path").with_header_name(not("Accept"));
        assert!(!matches(
            &matcher,
            &request()
                .with_path("/some/path")
                .with_header("Accept", "application/json")
        ));
        assert!(matches(
            &matcher,
            &request().with_path("/some/path").with_header("Host", "localhost")
        ));
        assert!(matches(&matcher, &request().with_path("/some/path")));
    }

    #[test]
    fn test_negated_request() {
        let matcher = request().with_path("/admin.*").negate();
        assert!(matches(&matcher, &request().with_path("/public")));
        assert!(!matches(&matcher, &request().with_path("/admin/users")));
    }

    #[test]
    fn test_path_template_extracts_parameters() {
        let matcher = request()
            .with_path("/cart/{cartId}/items")
            .with_path_parameter("cartId", [string("[0-9]+")]);
        assert!(matches(&matcher, &request().with_path("/cart/42/items")));
        assert!(!matches(&matcher, &request().with_path("/cart/abc/items")));
        assert!(!matches(&matcher, &request().with_path("/cart/42")));
    }

    #[test]
    fn test_query_cookies_body_and_flags() {
        let matcher = request()
            .with_query_string_parameter("page", [string("[0-9]+")])
            .with_cookies(Cookies::new().with_entry("session", ".+"))
            .with_body(Body::json(json!({"id": 1})))
            .with_secure(true);
        let matched = request()
            .with_query_string_parameter("page", [string("2")])
            .with_cookie("session", "abc")
            .with_body(Body::exact(r#"{"id": 1, "extra": true}"#))
            .with_secure(true);
        assert!(matches(&matcher, &matched));
        assert!(!matches(&matcher, &matched.clone().with_secure(false)));
    }

    #[test]
    fn test_socket_address() {
        let matcher = request().with_socket_address(SocketAddress {
            host: Some("api\\..*".to_string()),
            port: Some(443),
            scheme: None,
        });
        assert!(matches(
            &matcher,
            &request().with_socket_address(SocketAddress::new("api.example.com", 443, Scheme::Https))
        ));
        assert!(!matches(
            &matcher,
            &request().with_socket_address(SocketAddress::new("api.example.com", 80, Scheme::Http))
        ));
        assert!(!matches(&matcher, &request()));
    }

    #[test]
    fn test_difference_collects_every_field() {
        let matcher = request().with_method("GET").with_path("/a").with_header("X-Id", "1");
        let mut diff = MatchDifference::new();
        let result = HttpRequestPropertiesMatcher::data_plane(&matcher)
            .matches(Some(&mut diff), &request().with_method("POST").with_path("/b"));
        assert!(!result);
        assert_eq!(
            diff.fields().collect::<Vec<_>>(),
            vec![
                MatchDifferenceField::Method,
                MatchDifferenceField::Path,
                MatchDifferenceField::Headers
            ]
        );
    }

    #[test]
    fn test_difference_does_not_change_result() {
        let matcher = request().with_method("GET").with_path("/a");
        let matched = request().with_method("GET").with_path("/a");
        let compiled = HttpRequestPropertiesMatcher::data_plane(&matcher);
        let mut diff = MatchDifference::new();
        assert_eq!(compiled.matches(None, &matched), compiled.matches(Some(&mut diff), &matched));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_control_plane_filter() {
        let filter = HttpRequestPropertiesMatcher::control_plane(&request().with_path("request_one"));
        assert!(filter.matches(None, &request().with_path("request_one").with_method("GET")));
        assert!(!filter.matches(None, &request().with_path("request_two")));
        // reverse direction: stored pattern matches the filter value
        assert!(filter.matches(None, &request().with_path("request_.*")));
    }
}
