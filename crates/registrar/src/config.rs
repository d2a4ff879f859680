//! Command line and environment configuration for the registrar binary.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REGISTRAR_DATABASE_URL` | registrar.db | SQLite database path (`:memory:` for a throwaway store) |
//! | `REGISTRAR_LOG_LEVEL` | info | Log level |
//! | `REGISTRAR_MAX_ATTEMPTS` | 3 | Total attempts per enrollment transaction |
//! | `REGISTRAR_BASE_DELAY_MS` | 100 | Backoff before the first retry (milliseconds) |
//! | `REGISTRAR_MAX_JITTER_MS` | 50 | Upper bound of the random jitter (milliseconds) |
//! | `REGISTRAR_POOL_SIZE` | 10 | SQLite connection pool size |

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use registrar_enrollment::{EngineConfig, RetryConfig};
use registrar_persistence::backends::sqlite::SqliteBackendConfig;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Registrar configuration and the operation to run.
#[derive(Debug, Clone, Parser)]
#[command(name = "registrar")]
#[command(about = "Tenant-isolated enrollment engine operator CLI")]
pub struct RegistrarConfig {
    /// SQLite database path.
    #[arg(long, env = "REGISTRAR_DATABASE_URL", default_value = "registrar.db", global = true)]
    pub database_url: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "REGISTRAR_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Total attempts per enrollment transaction, including the first.
    #[arg(long, env = "REGISTRAR_MAX_ATTEMPTS", default_value = "3", global = true)]
    pub max_attempts: u32,

    /// Backoff before the first retry, in milliseconds. Doubles per retry.
    #[arg(long, env = "REGISTRAR_BASE_DELAY_MS", default_value = "100", global = true)]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff, in milliseconds.
    #[arg(long, env = "REGISTRAR_MAX_JITTER_MS", default_value = "50", global = true)]
    pub max_jitter_ms: u64,

    /// SQLite connection pool size.
    #[arg(long, env = "REGISTRAR_POOL_SIZE", default_value = "10", global = true)]
    pub pool_size: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations the CLI can perform.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the schema, optionally loading institutions, memberships,
    /// students and courses from a JSON seed file.
    Init {
        /// Seed document to load after the schema is created.
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Enroll the calling principal's student profile in a course.
    Enroll {
        #[arg(long)]
        principal: String,
        #[arg(long)]
        institution: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// Drop the calling principal's active enrollment in a course.
    Drop {
        #[arg(long)]
        principal: String,
        #[arg(long)]
        institution: String,
        #[arg(long)]
        course: String,
        /// Restrict the drop to one semester.
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// Enroll a student as an administrator, ignoring the seat limit.
    AdminEnroll {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        institution: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// Remove a student from a roster as an administrator.
    AdminRemove {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        institution: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        correlation_id: Option<String>,
    },

    /// Print the enrollment rows of a course.
    Roster {
        #[arg(long)]
        institution: String,
        #[arg(long)]
        course: String,
    },
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            database_url: "registrar.db".to_string(),
            log_level: "info".to_string(),
            max_attempts: 3,
            base_delay_ms: 100,
            max_jitter_ms: 50,
            pool_size: 10,
            command: Command::Init { seed: None },
        }
    }
}

impl RegistrarConfig {
    /// Validates the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database_url.trim().is_empty() {
            errors.push("Database URL cannot be empty".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Unknown log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if self.pool_size == 0 {
            errors.push("Pool size cannot be 0".to_string());
        }

        if let Err(engine_errors) = self.engine_config().validate() {
            errors.extend(engine_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the engine configuration from the retry flags.
    pub fn engine_config(&self) -> EngineConfig {
        let defaults = RetryConfig::default();
        let base_delay = Duration::from_millis(self.base_delay_ms);
        EngineConfig {
            retry: RetryConfig {
                max_attempts: self.max_attempts,
                base_delay,
                max_jitter: Duration::from_millis(self.max_jitter_ms),
                max_delay: defaults.max_delay.max(base_delay),
            },
        }
    }

    /// Builds the SQLite backend configuration.
    pub fn backend_config(&self) -> SqliteBackendConfig {
        SqliteBackendConfig {
            max_connections: self.pool_size,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistrarConfig::default();
        assert_eq!(config.database_url, "registrar.db");
        assert_eq!(config.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_from_flags() {
        let config = RegistrarConfig {
            max_attempts: 5,
            base_delay_ms: 20,
            max_jitter_ms: 0,
            ..Default::default()
        };
        let retry = config.engine_config().retry;
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(20));
        assert_eq!(retry.max_jitter, Duration::ZERO);
        assert_eq!(retry.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_large_base_delay_raises_cap() {
        let config = RegistrarConfig {
            base_delay_ms: 5_000,
            ..Default::default()
        };
        assert_eq!(
            config.engine_config().retry.max_delay,
            Duration::from_secs(5)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = RegistrarConfig {
            log_level: "loud".to_string(),
            max_attempts: 0,
            pool_size: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("log level")));
        assert!(errors.iter().any(|e| e.contains("max_attempts")));
        assert!(errors.iter().any(|e| e.contains("Pool size")));
    }

    #[test]
    fn test_parse_enroll_command() {
        let config = RegistrarConfig::try_parse_from([
            "registrar",
            "--database-url",
            ":memory:",
            "enroll",
            "--principal",
            "alice",
            "--institution",
            "inst-a",
            "--course",
            "cs101",
            "--semester",
            "fall",
            "--year",
            "2026",
        ])
        .unwrap();

        assert_eq!(config.database_url, ":memory:");
        match config.command {
            Command::Enroll {
                principal, course, ..
            } => {
                assert_eq!(principal, "alice");
                assert_eq!(course, "cs101");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let config = RegistrarConfig::try_parse_from([
            "registrar",
            "roster",
            "--institution",
            "inst-a",
            "--course",
            "cs101",
            "--max-attempts",
            "7",
        ])
        .unwrap();
        assert_eq!(config.max_attempts, 7);
    }
}
