//! XML body matcher.
//!
//! Documents are compared as element trees: names and namespaces must agree,
//! attribute order is ignored, whitespace-only text and comments are dropped
//! and text is compared trimmed. Expected text and attribute values may use
//! placeholders:
//!
//! - `${xmlunit.ignore}` - any value (as sole element content: any content)
//! - `${xmlunit.isNumber}` - a number
//! - `${xmlunit.isDateTime}` - an ISO-8601 date or date-time
//! - `${xmlunit.matchesRegex(<pattern>)}` - text matching the pattern

use super::difference::MatchDifference;
use super::regex_string::regex_matches;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

const IGNORE: &str = "${xmlunit.ignore}";
const IS_NUMBER: &str = "${xmlunit.isNumber}";
const IS_DATE_TIME: &str = "${xmlunit.isDateTime}";
const MATCHES_REGEX_PREFIX: &str = "${xmlunit.matchesRegex(";
const MATCHES_REGEX_SUFFIX: &str = ")}";

/// Owned, thread-safe copy of a parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

impl XmlNode {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<XmlNode, String> {
        let package = parser::parse(xml).map_err(|e| format!("failed to parse XML: {e:?}"))?;
        let document = package.as_document();
        document
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(XmlNode::from_element(element)),
                _ => None,
            })
            .ok_or_else(|| "XML document has no root element".to_string())
    }

    fn from_element(element: Element) -> XmlNode {
        let name = element.name();
        let mut attributes: Vec<(String, String)> = element
            .attributes()
            .into_iter()
            .map(|a| {
                let qname = a.name();
                let key = match qname.namespace_uri() {
                    Some(ns) => format!("{{{ns}}}{}", qname.local_part()),
                    None => qname.local_part().to_string(),
                };
                (key, a.value().to_string())
            })
            .collect();
        attributes.sort();

        let mut children: Vec<XmlChild> = Vec::new();
        for child in element.children() {
            match child {
                ChildOfElement::Element(e) => children.push(XmlChild::Element(Self::from_element(e))),
                ChildOfElement::Text(t) => {
                    let text = t.text().trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(XmlChild::Text(previous)) = children.last_mut() {
                        previous.push_str(text);
                    } else {
                        children.push(XmlChild::Text(text.to_string()));
                    }
                }
                _ => {}
            }
        }

        XmlNode {
            namespace: name.namespace_uri().map(str::to_string),
            name: name.local_part().to_string(),
            attributes,
            children,
        }
    }

    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlChild::Text(t) => Some(t.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct XmlStringMatcher {
    expected: Result<XmlNode, String>,
}

impl XmlStringMatcher {
    pub fn new(expected: &str) -> Self {
        Self {
            expected: XmlNode::parse(expected),
        }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &str) -> bool {
        let expected = match &self.expected {
            Ok(node) => node,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(format!("xml matcher is not valid XML: {e}"));
                }
                return false;
            }
        };
        let actual = match XmlNode::parse(matched) {
            Ok(node) => node,
            Err(e) => {
                if let Some(ctx) = context {
                    ctx.add(e);
                }
                return false;
            }
        };

        match compare(expected, &actual, &format!("/{}", expected.name)) {
            None => true,
            Some(difference) => {
                if let Some(ctx) = context {
                    ctx.add(format!("xml match failed: {difference}"));
                }
                false
            }
        }
    }
}

fn compare(expected: &XmlNode, actual: &XmlNode, path: &str) -> Option<String> {
    if expected.name != actual.name || expected.namespace != actual.namespace {
        return Some(format!(
            "{path}: expected element <{}> but was <{}>",
            expected.name, actual.name
        ));
    }

    if let [XmlChild::Text(only)] = expected.children.as_slice() {
        if only == IGNORE {
            return None;
        }
    }

    if expected.attributes.len() != actual.attributes.len() {
        return Some(format!(
            "{path}: expected {} attributes but was {}",
            expected.attributes.len(),
            actual.attributes.len()
        ));
    }
    for (name, expected_value) in &expected.attributes {
        match actual.attributes.iter().find(|(n, _)| n == name) {
            Some((_, actual_value)) if text_matches(expected_value, actual_value) => {}
            Some((_, actual_value)) => {
                return Some(format!(
                    "{path}/@{name}: expected \"{expected_value}\" but was \"{actual_value}\""
                ))
            }
            None => return Some(format!("{path}/@{name}: missing attribute")),
        }
    }

    if expected.children.len() != actual.children.len() {
        return Some(format!(
            "{path}: expected {} child nodes but was {}",
            expected.children.len(),
            actual.children.len()
        ));
    }
    for (e, a) in expected.children.iter().zip(&actual.children) {
        let difference = match (e, a) {
            (XmlChild::Element(e), XmlChild::Element(a)) => {
                compare(e, a, &format!("{path}/{}", e.name))
            }
            (XmlChild::Text(e), XmlChild::Text(a)) => (!text_matches(e, a))
                .then(|| format!("{path}/text(): expected \"{e}\" but was \"{a}\"")),
            (XmlChild::Element(e), XmlChild::Text(a)) => Some(format!(
                "{path}: expected element <{}> but was text \"{a}\"",
                e.name
            )),
            (XmlChild::Text(e), XmlChild::Element(a)) => Some(format!(
                "{path}: expected text \"{e}\" but was element <{}>",
                a.name
            )),
        };
        if difference.is_some() {
            return difference;
        }
    }
    None
}

fn text_matches(expected: &str, actual: &str) -> bool {
    match expected {
        IGNORE => true,
        IS_NUMBER => actual.trim().parse::<f64>().is_ok(),
        IS_DATE_TIME => is_date_time(actual.trim()),
        _ => match expected
            .strip_prefix(MATCHES_REGEX_PREFIX)
            .and_then(|rest| rest.strip_suffix(MATCHES_REGEX_SUFFIX))
        {
            Some(pattern) => regex_matches(pattern, actual, false),
            None => expected == actual,
        },
    }
}

fn is_date_time(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}
