//! Diagnostic record of why a request did not match an expectation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Request field a mismatch is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchDifferenceField {
    Method,
    Path,
    PathParameters,
    QueryStringParameters,
    Cookies,
    Headers,
    Body,
    Secure,
    KeepAlive,
    SocketAddress,
}

impl MatchDifferenceField {
    pub fn name(&self) -> &'static str {
        match self {
            MatchDifferenceField::Method => "method",
            MatchDifferenceField::Path => "path",
            MatchDifferenceField::PathParameters => "pathParameters",
            MatchDifferenceField::QueryStringParameters => "queryStringParameters",
            MatchDifferenceField::Cookies => "cookies",
            MatchDifferenceField::Headers => "headers",
            MatchDifferenceField::Body => "body",
            MatchDifferenceField::Secure => "secure",
            MatchDifferenceField::KeepAlive => "keepAlive",
            MatchDifferenceField::SocketAddress => "socketAddress",
        }
    }
}

/// First mismatch reason per field for one match attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDifference {
    #[serde(skip_serializing_if = "Option::is_none")]
    expectation_id: Option<String>,
    #[serde(skip)]
    current_field: Option<MatchDifferenceField>,
    differences: BTreeMap<MatchDifferenceField, String>,
}

impl MatchDifference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_expectation(id: impl Into<String>) -> Self {
        Self {
            expectation_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn expectation_id(&self) -> Option<&str> {
        self.expectation_id.as_deref()
    }

    /// Field that subsequent `add` calls are attributed to.
    pub fn set_field(&mut self, field: MatchDifferenceField) {
        self.current_field = Some(field);
    }

    /// Record a reason against the current field; later reasons are dropped.
    pub fn add(&mut self, reason: impl Into<String>) {
        if let Some(field) = self.current_field {
            self.differences.entry(field).or_insert_with(|| reason.into());
        }
    }

    pub fn get(&self, field: MatchDifferenceField) -> Option<&str> {
        self.differences.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = MatchDifferenceField> + '_ {
        self.differences.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.differences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }
}

impl fmt::Display for MatchDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.expectation_id {
            writeln!(f, "request didn't match expectation {id}:")?;
        }
        for (field, reason) in &self.differences {
            writeln!(f, "  {} didn't match: {}", field.name(), reason)?;
        }
        Ok(())
    }
}
