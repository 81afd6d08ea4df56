//! How long an expectation stays eligible to match.

use crate::model::TimeUnit;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeToLive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_to_live: Option<u64>,
    #[serde(default)]
    unlimited: bool,
}

impl Default for TimeToLive {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl TimeToLive {
    pub fn unlimited() -> Self {
        Self {
            time_unit: None,
            time_to_live: None,
            unlimited: true,
        }
    }

    pub fn exactly(time_unit: TimeUnit, time_to_live: u64) -> Self {
        Self {
            time_unit: Some(time_unit),
            time_to_live: Some(time_to_live),
            unlimited: false,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.time_unit
    }

    pub fn time_to_live(&self) -> Option<u64> {
        self.time_to_live
    }

    /// Lifetime from upsert, `None` when unlimited.
    ///
    /// A limited TTL without a value has zero duration.
    pub fn duration(&self) -> Option<Duration> {
        if self.unlimited {
            return None;
        }
        let unit = self.time_unit.unwrap_or_default();
        Some(unit.to_duration(self.time_to_live.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duration() {
        assert_eq!(TimeToLive::unlimited().duration(), None);
        assert_eq!(
            TimeToLive::exactly(TimeUnit::Seconds, 0).duration(),
            Some(Duration::ZERO)
        );
        assert_eq!(
            TimeToLive::exactly(TimeUnit::Minutes, 2).duration(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_json_forms() {
        assert_eq!(
            serde_json::to_value(TimeToLive::exactly(TimeUnit::Seconds, 5)).unwrap(),
            json!({"timeUnit": "SECONDS", "timeToLive": 5, "unlimited": false})
        );
        let parsed: TimeToLive = serde_json::from_value(json!({"unlimited": true})).unwrap();
        assert!(parsed.is_unlimited());
    }
}
