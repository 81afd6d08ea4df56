//! BINARY body matcher: byte-for-byte equality.

use super::difference::MatchDifference;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, Default)]
pub struct BinaryMatcher {
    expected: Vec<u8>,
}

impl BinaryMatcher {
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn matches(&self, context: Option<&mut MatchDifference>, matched: &[u8]) -> bool {
        if self.is_blank() || self.expected == matched {
            return true;
        }
        if let Some(ctx) = context {
            ctx.add(format!(
                "binary match failed expected:\n  {}\n found:\n  {}",
                STANDARD.encode(&self.expected),
                STANDARD.encode(matched)
            ));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_equality() {
        let matcher = BinaryMatcher::new(vec![0u8, 1, 2, 255]);
        assert!(matcher.matches(None, &[0, 1, 2, 255]));
        assert!(!matcher.matches(None, &[0, 1, 2]));
        assert!(BinaryMatcher::default().matches(None, b"anything"));
    }
}
