//! String matching where the matcher value may be a literal, a regex or a
//! JSON schema.
//!
//! Evaluation order for a non-blank matcher:
//! 1. exact equality
//! 2. matcher value as a regex over the whole matched value
//! 3. control plane only: matched value as a regex over the matcher value
//! 4. when `ignore_case`: steps 1-3 case-insensitively
//!
//! The `not` flags of both sides and the matcher-level `not` combine by XOR, so
//! a negation on both sides cancels out. Invalid regexes never raise: they are
//! logged at debug level and count as a non-match.

use super::difference::MatchDifference;
use super::json_schema::JsonSchemaValidator;
use crate::model::NottableString;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const MAX_CACHED_PATTERNS: usize = 10_000;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

type PatternKey = (String, bool);

static PATTERNS: Lazy<RwLock<HashMap<PatternKey, Option<Arc<Regex>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Anchored regex for `pattern`, or `None` when it does not compile.
fn compiled(pattern: &str, ignore_case: bool) -> Option<Arc<Regex>> {
    let key = (pattern.to_string(), ignore_case);
    if let Some(found) = PATTERNS.read().get(&key) {
        return found.clone();
    }

    let built = RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(ignore_case)
        .size_limit(REGEX_SIZE_LIMIT)
        .build();
    let entry = match built {
        Ok(regex) => Some(Arc::new(regex)),
        Err(e) => {
            debug!("error while matching regex [{}]: {}", pattern, e);
            None
        }
    };

    let mut cache = PATTERNS.write();
    if cache.len() >= MAX_CACHED_PATTERNS {
        cache.clear();
    }
    cache.insert(key, entry.clone());
    entry
}

/// Whole-value regex match; invalid patterns do not match.
pub fn regex_matches(pattern: &str, value: &str, ignore_case: bool) -> bool {
    compiled(pattern, ignore_case).is_some_and(|regex| regex.is_match(value))
}

#[derive(Debug, Clone, Default)]
pub struct RegexStringMatcher {
    matcher: Option<NottableString>,
    control_plane: bool,
    not: bool,
}

impl RegexStringMatcher {
    pub fn new(matcher: Option<NottableString>, control_plane: bool) -> Self {
        Self {
            matcher,
            control_plane,
            not: false,
        }
    }

    /// Matcher whose overall result is inverted.
    pub fn negate(mut self) -> Self {
        self.not = !self.not;
        self
    }

    pub fn is_control_plane(&self) -> bool {
        self.control_plane
    }

    /// A blank matcher matches anything.
    pub fn is_blank(&self) -> bool {
        self.matcher.as_ref().is_none_or(NottableString::is_blank)
    }

    /// Match one value; `None` (field absent) only matches a blank matcher.
    pub fn matches(
        &self,
        context: Option<&mut MatchDifference>,
        matched: Option<&NottableString>,
    ) -> bool {
        let matcher = match &self.matcher {
            Some(m) if !m.is_blank() => m,
            _ => return true,
        };

        let result = match matched {
            Some(value) => self.matches_strings(matcher, value, true),
            None => false,
        };
        let result = self.not != result;

        if !result {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "string or regex match failed expected:\n  {}\n found:\n  {}",
                    matcher,
                    matched.map(ToString::to_string).unwrap_or_else(|| "none".to_string())
                ));
            }
        }
        result
    }

    /// Compare two nottable strings, either of which may be a schema string.
    pub fn matches_strings(
        &self,
        matcher: &NottableString,
        matched: &NottableString,
        ignore_case: bool,
    ) -> bool {
        match (matcher.is_schema(), matched.is_schema()) {
            (true, true) => self.control_plane && self.matches_notted(matcher, matched, ignore_case),
            (true, false) => matches_schema(matcher, matched),
            (false, true) => self.control_plane && matches_schema(matched, matcher),
            (false, false) => self.matches_notted(matcher, matched, ignore_case),
        }
    }

    fn matches_notted(
        &self,
        matcher: &NottableString,
        matched: &NottableString,
        ignore_case: bool,
    ) -> bool {
        let raw = self.matches_values(matcher.value(), matched.value(), ignore_case);
        matcher.is_not() ^ matched.is_not() ^ raw
    }

    /// Literal/regex comparison of raw values, ignoring flags.
    pub fn matches_values(&self, matcher: &str, matched: &str, ignore_case: bool) -> bool {
        if matcher.is_empty() || matcher == matched {
            return true;
        }
        if regex_matches(matcher, matched, false) {
            return true;
        }
        if self.control_plane && regex_matches(matched, matcher, false) {
            return true;
        }
        if ignore_case {
            if matcher.eq_ignore_ascii_case(matched) || regex_matches(matcher, matched, true) {
                return true;
            }
            if self.control_plane && regex_matches(matched, matcher, true) {
                return true;
            }
        }
        false
    }
}

/// Validate `value` against the schema carried by `schema`.
fn matches_schema(schema: &NottableString, value: &NottableString) -> bool {
    let valid = match schema.schema_value() {
        Some(document) => match JsonSchemaValidator::cached(&document) {
            Ok(validator) => validator.validate_text(value.value()).is_empty(),
            Err(e) => {
                debug!("schema string cannot be compiled: {}", e);
                false
            }
        },
        None => false,
    };
    schema.is_not() ^ value.is_not() ^ valid
}
