//! Engine configuration.
//!
//! # Example
//!
//! ```
//! use registrar_enrollment::config::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(
//!     r#"{ "retry": { "max_attempts": 5, "base_delay": "20ms" } }"#,
//! ).unwrap();
//! assert_eq!(config.retry.max_attempts, 5);
//! assert_eq!(config.retry.base_delay.as_millis(), 20);
//! assert_eq!(config.retry.max_jitter.as_millis(), 50);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry policy for optimistic-lock conflicts.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Validates the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        self.retry.validate()
    }
}

/// Retry configuration for transactional operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry. Doubles after every failed attempt.
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    pub base_delay: Duration,

    /// Upper bound of the uniform random jitter added to each delay.
    #[serde(with = "humantime_serde", default = "default_max_jitter")]
    pub max_jitter: Duration,

    /// Cap on the exponential component.
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_jitter() -> Duration {
    Duration::from_millis(50)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(2)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_jitter: default_max_jitter(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// A configuration that never waits. Used by tests and tools.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.max_attempts > 10 {
            errors.push(format!(
                "retry.max_attempts must be at most 10, got {}",
                self.max_attempts
            ));
        }
        if self.base_delay > self.max_delay {
            errors.push(format!(
                "retry.base_delay ({}) exceeds retry.max_delay ({})",
                humantime::format_duration(self.base_delay),
                humantime::format_duration(self.max_delay)
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(100));
        assert_eq!(config.max_jitter, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_humantime_round_trip() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(250),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["base_delay"], "250ms");
        let back: RetryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = RetryConfig {
            max_attempts: 0,
            base_delay: Duration::from_secs(10),
            max_jitter: Duration::ZERO,
            max_delay: Duration::from_secs(1),
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("max_attempts"));
        assert!(errors[1].contains("base_delay"));
    }
}
