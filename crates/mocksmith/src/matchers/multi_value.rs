//! Matchers for keyed collections.
//!
//! [`MultiValueMapMatcher`] handles headers, query string and path parameters
//! (key to many values), [`HashMapMatcher`] handles cookies (key to one value).
//!
//! Rules for each matcher entry:
//! - optional key (`?name`): passes when no matched key matches it
//! - notted key (`!name`): passes when no matched entry has a matching key
//!   (and, if values are listed, a matching value)
//! - plain key: some matched key must match; an empty value list only checks
//!   presence; each plain matcher value needs at least one matched value and
//!   each notted matcher value must hold for every matched value
//!
//! With [`KeyMatchStyle::MatchingKey`] the matched collection may not carry
//! keys the matcher does not name, and every value of a named key must match
//! one of the matcher's values.

use super::difference::MatchDifference;
use super::regex_string::RegexStringMatcher;
use crate::model::{Cookies, KeyMatchStyle, KeyToMultiValue, KeysToMultiValues, NottableString};

#[derive(Debug, Clone)]
pub struct MultiValueMapMatcher {
    matcher: Option<KeysToMultiValues>,
    strings: RegexStringMatcher,
    ignore_case_keys: bool,
}

impl MultiValueMapMatcher {
    /// `ignore_case_keys` is set for headers only.
    pub fn new(matcher: Option<KeysToMultiValues>, control_plane: bool, ignore_case_keys: bool) -> Self {
        Self {
            matcher,
            strings: RegexStringMatcher::new(None, control_plane),
            ignore_case_keys,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.matcher.as_ref().is_none_or(KeysToMultiValues::is_empty)
    }

    pub fn matches(
        &self,
        context: Option<&mut MatchDifference>,
        matched: Option<&KeysToMultiValues>,
    ) -> bool {
        let matcher = match &self.matcher {
            Some(m) if !m.is_empty() => m,
            _ => return true,
        };
        let empty = KeysToMultiValues::default();
        let matched = matched.unwrap_or(&empty);

        match self.first_failure(matcher, matched) {
            None => true,
            Some(reason) => {
                if let Some(ctx) = context {
                    ctx.add(format!(
                        "multimap match failed expected:\n  {}\n found:\n  {}\n failed because:\n  {}",
                        matcher.to_json(),
                        matched.to_json(),
                        reason
                    ));
                }
                false
            }
        }
    }

    fn first_failure(&self, matcher: &KeysToMultiValues, matched: &KeysToMultiValues) -> Option<String> {
        for entry in &matcher.entries {
            if let Some(reason) = self.entry_failure(entry, matched) {
                return Some(reason);
            }
        }
        if matcher.key_match_style == KeyMatchStyle::MatchingKey {
            return self.matching_key_failure(matcher, matched);
        }
        None
    }

    fn entry_failure(&self, entry: &KeyToMultiValue, matched: &KeysToMultiValues) -> Option<String> {
        let key = &entry.name;
        let same_key: Vec<&KeyToMultiValue> = matched
            .entries
            .iter()
            .filter(|m| self.key_matches(key, &m.name))
            .collect();

        if key.is_not() {
            let present = same_key
                .iter()
                .any(|m| entry.values.is_empty() || self.values_match(&entry.values, &m.values));
            return present.then(|| format!("{} must not be present", key.value()));
        }
        if same_key.is_empty() {
            return (!key.is_optional()).then(|| format!("none of the keys match {}", key.value()));
        }
        if entry.values.is_empty() {
            return None;
        }

        let values: Vec<NottableString> = same_key
            .iter()
            .flat_map(|m| m.values.iter().cloned())
            .collect();
        (!self.values_match(&entry.values, &values))
            .then(|| format!("values of {} do not match", key.value()))
    }

    fn matching_key_failure(&self, matcher: &KeysToMultiValues, matched: &KeysToMultiValues) -> Option<String> {
        for entry in &matched.entries {
            let owners: Vec<&KeyToMultiValue> = matcher
                .entries
                .iter()
                .filter(|m| !m.name.is_not() && self.key_matches(&m.name, &entry.name))
                .collect();
            if owners.is_empty() {
                return Some(format!(
                    "{} is not one of the expected keys",
                    entry.name.value()
                ));
            }
            let allowed: Vec<&NottableString> = owners.iter().flat_map(|o| o.values.iter()).collect();
            if allowed.is_empty() {
                continue;
            }
            for value in &entry.values {
                if !allowed.iter().any(|a| self.strings.matches_strings(a, value, false)) {
                    return Some(format!(
                        "value {} of {} is not one of the expected values",
                        value,
                        entry.name.value()
                    ));
                }
            }
        }
        None
    }

    fn key_matches(&self, matcher: &NottableString, matched: &NottableString) -> bool {
        self.strings
            .matches_strings(&matcher.plain(), matched, self.ignore_case_keys)
    }

    /// Plain values need one matching value; notted values must hold for all.
    fn values_match(&self, expected: &[NottableString], matched: &[NottableString]) -> bool {
        expected.iter().all(|value| {
            if value.is_not() {
                matched
                    .iter()
                    .all(|m| self.strings.matches_strings(value, m, false))
            } else {
                matched
                    .iter()
                    .any(|m| self.strings.matches_strings(value, m, false))
            }
        })
    }
}

/// Cookie matcher; keys are case-sensitive.
#[derive(Debug, Clone)]
pub struct HashMapMatcher {
    matcher: Option<Cookies>,
    strings: RegexStringMatcher,
}

impl HashMapMatcher {
    pub fn new(matcher: Option<Cookies>, control_plane: bool) -> Self {
        Self {
            matcher,
            strings: RegexStringMatcher::new(None, control_plane),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.matcher.as_ref().is_none_or(Cookies::is_empty)
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: Option<&Cookies>) -> bool {
        let matcher = match &self.matcher {
            Some(m) if !m.is_empty() => m,
            _ => return true,
        };
        let empty = Cookies::default();
        let matched = matched.unwrap_or(&empty);

        for expected in &matcher.entries {
            let key = &expected.name;
            let same_key: Vec<_> = matched
                .entries
                .iter()
                .filter(|m| self.strings.matches_strings(&key.plain(), &m.name, false))
                .collect();

            let failure = if key.is_not() {
                same_key
                    .iter()
                    .any(|m| self.strings.matches_strings(&expected.value, &m.value, false))
                    .then(|| format!("{} must not be present", key.value()))
            } else if same_key.is_empty() {
                (!key.is_optional()).then(|| format!("none of the keys match {}", key.value()))
            } else {
                (!same_key
                    .iter()
                    .any(|m| self.strings.matches_strings(&expected.value, &m.value, false)))
                .then(|| format!("value of {} does not match", key.value()))
            };

            if let Some(reason) = failure {
                if let Some(ctx) = context {
                    ctx.add(format!(
                        "map match failed expected:\n  {}\n found:\n  {}\n failed because:\n  {}",
                        matcher.to_json(),
                        matched.to_json(),
                        reason
                    ));
                }
                return false;
            }
        }
        true
    }
}
