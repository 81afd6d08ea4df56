//! Engine configuration.
//!
//! Passed explicitly to the store, the event log and `HttpState` at
//! construction. Every field has a default so an empty YAML document is a
//! valid configuration:
//!
//! ```yaml
//! maxExpectations: 5000
//! maxLogEntries: 10000
//! detailedMatchFailures: true
//! forwardTimeoutMs: 30000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Upper bound on stored expectations; the oldest is evicted beyond it.
    #[serde(default = "default_max_expectations")]
    pub max_expectations: usize,

    /// Upper bound on retained event log entries.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Compute the nearest-miss difference for unmatched requests.
    #[serde(default = "default_detailed_match_failures")]
    pub detailed_match_failures: bool,

    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
}

fn default_max_expectations() -> usize {
    5000
}

fn default_max_log_entries() -> usize {
    10000
}

fn default_detailed_match_failures() -> bool {
    true
}

fn default_forward_timeout_ms() -> u64 {
    30000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expectations: default_max_expectations(),
            max_log_entries: default_max_log_entries(),
            detailed_match_failures: default_detailed_match_failures(),
            forward_timeout_ms: default_forward_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_expectations == 0 {
            anyhow::bail!("'maxExpectations' must be greater than zero");
        }
        if self.max_log_entries == 0 {
            anyhow::bail!("'maxLogEntries' must be greater than zero");
        }
        if self.forward_timeout_ms == 0 {
            anyhow::bail!("'forwardTimeoutMs' must be greater than zero");
        }
        Ok(())
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
maxExpectations: 10
detailedMatchFailures: false
forwardTimeoutMs: 250
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_expectations, 10);
        assert_eq!(config.max_log_entries, 10000);
        assert!(!config.detailed_match_failures);
        assert_eq!(config.forward_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig {
            max_log_entries: 0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("maxLogEntries"));
    }
}
