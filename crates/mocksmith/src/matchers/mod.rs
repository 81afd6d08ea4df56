//! Request matching.
//!
//! Every matcher answers "does this matched value satisfy me" and can record
//! the reason it did not in an optional [`MatchDifference`]. Matching never
//! fails with an error: malformed patterns, schemas and bodies count as a
//! non-match for the field concerned.
//!
//! # Module Structure
//!
//! - `difference` - per-field mismatch diagnostics
//! - `regex_string` - literal/regex/schema string matching with `not` flags
//! - `substring` - substring and exact string matchers
//! - `boolean` - `secure` and `keepAlive` flags
//! - `json`, `json_schema`, `json_path` - JSON bodies
//! - `xml`, `xml_schema`, `xpath` - XML bodies
//! - `binary` - byte-exact bodies
//! - `multi_value` - headers, parameters and cookies
//! - `body` - body type dispatch
//! - `request` - the composite request matcher

mod binary;
mod body;
mod boolean;
mod difference;
mod json;
mod json_path;
mod json_schema;
mod multi_value;
mod regex_string;
mod request;
mod substring;
mod xml;
mod xml_schema;
mod xpath;

pub use binary::BinaryMatcher;
pub use body::BodyMatcher;
pub use boolean::BooleanMatcher;
pub use difference::{MatchDifference, MatchDifferenceField};
pub use json::JsonStringMatcher;
pub use json_path::JsonPathMatcher;
pub use json_schema::{JsonSchemaMatcher, JsonSchemaValidator};
pub use multi_value::{HashMapMatcher, MultiValueMapMatcher};
pub use regex_string::{regex_matches, RegexStringMatcher};
pub use request::HttpRequestPropertiesMatcher;
pub use substring::{ExactStringMatcher, SubStringMatcher};
pub use xml::{XmlChild, XmlNode, XmlStringMatcher};
pub use xml_schema::{XmlSchemaMatcher, XmlSchemaValidator};
pub use xpath::XPathMatcher;
