//! Boolean field matcher (`secure`, `keepAlive`).

use super::difference::MatchDifference;

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanMatcher {
    matcher: Option<bool>,
}

impl BooleanMatcher {
    pub fn new(matcher: Option<bool>) -> Self {
        Self { matcher }
    }

    pub fn is_blank(&self) -> bool {
        self.matcher.is_none()
    }

    /// An absent matcher matches; otherwise the values must be equal.
    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: Option<bool>) -> bool {
        let Some(expected) = self.matcher else {
            return true;
        };
        let result = matched == Some(expected);
        if !result {
            if let Some(ctx) = context {
                ctx.add(format!(
                    "boolean match failed expected:\n  {}\n found:\n  {}",
                    expected,
                    matched.map(|b| b.to_string()).unwrap_or_else(|| "none".to_string())
                ));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_matcher() {
        assert!(BooleanMatcher::new(None).matches(None, Some(true)));
        assert!(BooleanMatcher::new(None).matches(None, None));
        assert!(BooleanMatcher::new(Some(true)).matches(None, Some(true)));
        assert!(!BooleanMatcher::new(Some(true)).matches(None, Some(false)));
        assert!(!BooleanMatcher::new(Some(false)).matches(None, None));
    }
}
