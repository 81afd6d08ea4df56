//! Property tests for matcher primitives.

use mocksmith::matchers::{
    BooleanMatcher, HttpRequestPropertiesMatcher, RegexStringMatcher, SubStringMatcher,
};
use mocksmith::{request, string, HttpRequest};
use proptest::prelude::*;

fn arb_request() -> impl Strategy<Value = HttpRequest> {
    (
        prop::sample::select(vec!["GET", "POST", "PUT", "DELETE"]),
        "/[a-z]{1,8}(/[a-z0-9]{1,8}){0,3}",
        prop::option::of(("[A-Za-z-]{1,12}", "[ -~]{0,16}")),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(method, path, header, secure)| {
            let mut req = request().with_method(method).with_path(path);
            if let Some((name, value)) = header {
                req = req.with_header(name, value);
            }
            if let Some(secure) = secure {
                req = req.with_secure(secure);
            }
            req
        })
}

proptest! {
    #[test]
    fn blank_string_matcher_matches_anything(value in "[ -~]{0,32}") {
        let matcher = RegexStringMatcher::new(None, false);
        prop_assert!(matcher.matches(None, Some(&string(value))));
        prop_assert!(RegexStringMatcher::new(Some(string("")), false).matches(None, None));
    }

    #[test]
    fn blank_request_matcher_matches_any_request(req in arb_request()) {
        prop_assert!(HttpRequestPropertiesMatcher::data_plane(&request()).matches(None, &req));
    }

    #[test]
    fn blank_boolean_and_substring_match(value in "[ -~]{0,32}", flag in any::<bool>()) {
        prop_assert!(BooleanMatcher::new(None).matches(None, Some(flag)));
        prop_assert!(SubStringMatcher::new(string("")).matches(None, &string(value)));
    }

    #[test]
    fn negated_string_matcher_inverts(matcher in "[a-z]{1,8}", value in "[a-z]{0,8}") {
        let plain = RegexStringMatcher::new(Some(string(matcher.clone())), false);
        let negated = RegexStringMatcher::new(Some(string(matcher)), false).negate();
        let value = string(value);
        prop_assert_eq!(negated.matches(None, Some(&value)), !plain.matches(None, Some(&value)));
    }

    #[test]
    fn negated_request_matcher_inverts(req in arb_request(), path in "/[a-z]{1,8}") {
        let matcher = request().with_path(path);
        let plain = HttpRequestPropertiesMatcher::data_plane(&matcher);
        let negated = HttpRequestPropertiesMatcher::data_plane(&matcher.negate());
        prop_assert_eq!(negated.matches(None, &req), !plain.matches(None, &req));
    }

    #[test]
    fn request_matches_itself(req in arb_request()) {
        prop_assert!(HttpRequestPropertiesMatcher::data_plane(&req).matches(None, &req));
    }
}
