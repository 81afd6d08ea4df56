//! How many times an expectation may match.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    #[serde(default, skip_serializing_if = "is_zero")]
    remaining_times: u32,
    #[serde(default)]
    unlimited: bool,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Default for Times {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Times {
    pub fn unlimited() -> Self {
        Self {
            remaining_times: 0,
            unlimited: true,
        }
    }

    pub fn exactly(count: u32) -> Self {
        Self {
            remaining_times: count,
            unlimited: false,
        }
    }

    pub fn once() -> Self {
        Self::exactly(1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Remaining count, `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        (!self.unlimited).then_some(self.remaining_times)
    }

    pub fn greater_than_zero(&self) -> bool {
        self.unlimited || self.remaining_times > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_forms() {
        assert_eq!(
            serde_json::to_value(Times::exactly(3)).unwrap(),
            json!({"remainingTimes": 3, "unlimited": false})
        );
        assert_eq!(
            serde_json::to_value(Times::unlimited()).unwrap(),
            json!({"unlimited": true})
        );
        let parsed: Times = serde_json::from_value(json!({"remainingTimes": 2})).unwrap();
        assert_eq!(parsed, Times::exactly(2));
    }

    #[test]
    fn test_remaining() {
        assert_eq!(Times::once().remaining(), Some(1));
        assert_eq!(Times::unlimited().remaining(), None);
        assert!(!Times::exactly(0).greater_than_zero());
    }
}
