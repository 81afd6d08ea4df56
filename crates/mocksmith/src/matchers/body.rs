//! Body matcher: dispatches on the body type of the matcher.
//!
//! The body-level `not` is applied here, after the typed matcher ran. An
//! `optional` body matches requests without a body. A `contentType` on the
//! matcher body additionally requires the request's media type to agree.

use super::binary::BinaryMatcher;
use super::difference::MatchDifference;
use super::json::JsonStringMatcher;
use super::json_path::JsonPathMatcher;
use super::json_schema::JsonSchemaMatcher;
use super::multi_value::MultiValueMapMatcher;
use super::regex_string::RegexStringMatcher;
use super::substring::{ExactStringMatcher, SubStringMatcher};
use super::xml::XmlStringMatcher;
use super::xml_schema::XmlSchemaMatcher;
use super::xpath::XPathMatcher;
use crate::model::{string, Body, BodyKind, Parameters};

#[derive(Debug, Clone)]
enum TypedMatcher {
    Exact(ExactStringMatcher),
    SubString(SubStringMatcher),
    Regex(String),
    Json(JsonStringMatcher),
    JsonSchema(JsonSchemaMatcher),
    JsonPath(JsonPathMatcher),
    Xml(XmlStringMatcher),
    XmlSchema(XmlSchemaMatcher),
    XPath(XPathMatcher),
    Binary(BinaryMatcher),
    Parameters(MultiValueMapMatcher),
}

impl TypedMatcher {
    fn new(body: &Body, control_plane: bool) -> Self {
        match &body.kind {
            BodyKind::String {
                value,
                sub_string: false,
            } => TypedMatcher::Exact(ExactStringMatcher::new(string(value))),
            BodyKind::String {
                value,
                sub_string: true,
            } => TypedMatcher::SubString(SubStringMatcher::new(string(value))),
            BodyKind::Regex(pattern) => TypedMatcher::Regex(pattern.clone()),
            BodyKind::Json { json, match_type } => {
                TypedMatcher::Json(JsonStringMatcher::new(json.clone(), *match_type))
            }
            BodyKind::JsonSchema(schema) => TypedMatcher::JsonSchema(JsonSchemaMatcher::new(schema)),
            BodyKind::JsonPath(path) => TypedMatcher::JsonPath(JsonPathMatcher::new(path)),
            BodyKind::Xml(xml) => TypedMatcher::Xml(XmlStringMatcher::new(xml)),
            BodyKind::XmlSchema(schema) => TypedMatcher::XmlSchema(XmlSchemaMatcher::new(schema)),
            BodyKind::XPath(xpath) => TypedMatcher::XPath(XPathMatcher::new(xpath)),
            BodyKind::Binary(bytes) => TypedMatcher::Binary(BinaryMatcher::new(bytes.clone())),
            BodyKind::Parameters(parameters) => TypedMatcher::Parameters(MultiValueMapMatcher::new(
                Some(parameters.clone()),
                control_plane,
                false,
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyMatcher {
    body: Option<Body>,
    typed: Option<TypedMatcher>,
    control_plane: bool,
}

impl BodyMatcher {
    pub fn new(body: Option<Body>, control_plane: bool) -> Self {
        let typed = body.as_ref().map(|b| TypedMatcher::new(b, control_plane));
        Self {
            body,
            typed,
            control_plane,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.body.is_none()
    }

    /// Match the request body; `content_type` is the request's `Content-Type`.
    pub fn matches(
        &self,
        mut context: Option<&mut MatchDifference>,
        matched: Option<&Body>,
        content_type: Option<&str>,
    ) -> bool {
        let (Some(body), Some(typed)) = (&self.body, &self.typed) else {
            return true;
        };

        let raw = match matched {
            None if body.optional => return true,
            None => {
                if let Some(ctx) = context.as_deref_mut() {
                    ctx.add(format!(
                        "body match failed expected {} body but request has no body",
                        body.kind.type_name()
                    ));
                }
                false
            }
            Some(matched) if self.control_plane && matched == body => true,
            Some(matched) => {
                // Inner matchers only explain positive mismatches
                let inner_context = if body.not { None } else { context.as_deref_mut() };
                self.content_type_matches(body, content_type, inner_context)
                    && self.typed_matches(
                        typed,
                        if body.not { None } else { context.as_deref_mut() },
                        matched,
                    )
            }
        };

        let result = body.not ^ raw;
        if !result && body.not {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "body matched {} but should not:\n  {}",
                    body.kind.type_name(),
                    body.as_string()
                ));
            }
        }
        result
    }

    fn content_type_matches(
        &self,
        body: &Body,
        content_type: Option<&str>,
        context: Option<&mut MatchDifference>,
    ) -> bool {
        let Some(expected) = &body.content_type else {
            return true;
        };
        let ok = content_type.is_some_and(|actual| media_type(actual) == media_type(expected));
        if !ok {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "content type match failed expected:\n  {}\n found:\n  {}",
                    expected,
                    content_type.unwrap_or("none")
                ));
            }
        }
        ok
    }

    fn typed_matches(
        &self,
        typed: &TypedMatcher,
        context: Option<&mut MatchDifference>,
        matched: &Body,
    ) -> bool {
        match typed {
            TypedMatcher::Exact(m) => m.matches(context, &string(matched.as_string())),
            TypedMatcher::SubString(m) => m.matches(context, &string(matched.as_string())),
            TypedMatcher::Regex(pattern) => {
                let text = matched.as_string();
                let ok = RegexStringMatcher::new(None, self.control_plane)
                    .matches_values(pattern, &text, false);
                if !ok {
                    if let Some(ctx) = context {
                        ctx.add(format!(
                            "regex match failed expected:\n  {pattern}\n found:\n  {text}"
                        ));
                    }
                }
                ok
            }
            TypedMatcher::Json(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::JsonSchema(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::JsonPath(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::Xml(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::XmlSchema(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::XPath(m) => m.matches(context, &matched.as_string()),
            TypedMatcher::Binary(m) => m.matches(context, &matched.as_bytes()),
            TypedMatcher::Parameters(m) => {
                let parameters = match &matched.kind {
                    BodyKind::Parameters(parameters) => parameters.clone(),
                    _ => parse_form(&matched.as_string()),
                };
                m.matches(context, Some(&parameters))
            }
        }
    }
}

/// `type/subtype` of a content type, lower-cased and without parameters.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decode an `application/x-www-form-urlencoded` body.
pub(crate) fn parse_form(text: &str) -> Parameters {
    let mut parameters = Parameters::new();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        parameters.add(string(decode(name)), [string(decode(value))]);
    }
    parameters
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}
