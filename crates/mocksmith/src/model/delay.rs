//! Time units and delays.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Duration of `amount` units, saturating on overflow.
    pub fn to_duration(&self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// Delay applied before an action's result is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delay {
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub value: u64,
}

impl Delay {
    pub fn new(time_unit: TimeUnit, value: u64) -> Self {
        Self { time_unit, value }
    }

    pub fn millis(value: u64) -> Self {
        Self::new(TimeUnit::Milliseconds, value)
    }

    pub fn duration(&self) -> Duration {
        self.time_unit.to_duration(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(TimeUnit::Seconds.to_duration(2), Duration::from_secs(2));
        assert_eq!(TimeUnit::Days.to_duration(1), Duration::from_secs(86_400));
        assert_eq!(
            TimeUnit::Hours.to_duration(u64::MAX),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn test_delay_json() {
        let delay: Delay =
            serde_json::from_str(r#"{"timeUnit": "SECONDS", "value": 3}"#).unwrap();
        assert_eq!(delay.duration(), Duration::from_secs(3));
    }
}
