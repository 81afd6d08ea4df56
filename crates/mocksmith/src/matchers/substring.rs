//! Substring and exact string matchers used for STRING bodies.
//!
//! Both combine the matcher's and the matched value's `not` flags by XOR, the
//! same way [`RegexStringMatcher`](super::regex_string::RegexStringMatcher)
//! does, so negating both sides cancels out.

use super::difference::MatchDifference;
use crate::model::NottableString;

#[derive(Debug, Clone)]
pub struct SubStringMatcher {
    matcher: NottableString,
    ignore_case: bool,
}

impl SubStringMatcher {
    pub fn new(matcher: NottableString) -> Self {
        Self {
            matcher,
            ignore_case: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &NottableString) -> bool {
        if self.matcher.is_blank() {
            return true;
        }
        let needle = self.matcher.value();
        let haystack = matched.value();
        let mut raw = haystack.contains(needle);
        if !raw && self.ignore_case {
            raw = haystack.to_lowercase().contains(&needle.to_lowercase());
        }
        let result = self.matcher.is_not() ^ matched.is_not() ^ raw;

        if !result {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "substring match failed expected:\n  {}\n found:\n  {}",
                    self.matcher, matched
                ));
            }
        }
        result
    }
}

#[derive(Debug, Clone)]
pub struct ExactStringMatcher {
    matcher: NottableString,
}

impl ExactStringMatcher {
    pub fn new(matcher: NottableString) -> Self {
        Self { matcher }
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &NottableString) -> bool {
        if self.matcher.is_blank() {
            return true;
        }
        let raw = self.matcher.value() == matched.value();
        let result = self.matcher.is_not() ^ matched.is_not() ^ raw;

        if !result {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "exact string match failed expected:\n  {}\n found:\n  {}",
                    self.matcher, matched
                ));
            }
        }
        result
    }
}
