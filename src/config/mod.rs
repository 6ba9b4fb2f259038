//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.
//! Topic and consumer-group names are deployment configuration, never
//! hardcoded at the call sites.

use secrecy::SecretString;

use crate::error::{Error, Result};
use crate::model::job::JobKind;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub stream: StreamConfig,
}

/// Stream-side deployment configuration: one (topic, group) binding per job
/// kind plus the shared poll tunables.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub format: TopicBinding,
    pub lint: TopicBinding,
    pub test_execution: TopicBinding,
    /// Bounded long-poll wait per broker read, in seconds.
    pub poll_timeout_secs: i32,
    /// How long a delivered record stays invisible to other readers.
    pub visibility_timeout_secs: i32,
}

#[derive(Debug, Clone)]
pub struct TopicBinding {
    pub topic: String,
    pub group: String,
}

impl StreamConfig {
    pub fn binding(&self, kind: JobKind) -> &TopicBinding {
        match kind {
            JobKind::Format => &self.format,
            JobKind::Lint => &self.lint,
            JobKind::TestExecution => &self.test_execution,
        }
    }

    pub fn topics(&self) -> [&str; 3] {
        [
            &self.format.topic,
            &self.lint.topic,
            &self.test_execution.topic,
        ]
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: var_or("LOG_LEVEL", "info"),
            stream: StreamConfig {
                format: TopicBinding {
                    topic: var_or("SNIPQ_FORMAT_TOPIC", "snippet_format"),
                    group: var_or("SNIPQ_FORMAT_GROUP", "format_workers"),
                },
                lint: TopicBinding {
                    topic: var_or("SNIPQ_LINT_TOPIC", "snippet_lint"),
                    group: var_or("SNIPQ_LINT_GROUP", "lint_workers"),
                },
                test_execution: TopicBinding {
                    topic: var_or("SNIPQ_TEST_EXECUTION_TOPIC", "snippet_test_execution"),
                    group: var_or("SNIPQ_TEST_EXECUTION_GROUP", "test_execution_workers"),
                },
                poll_timeout_secs: int_var_or("SNIPQ_POLL_TIMEOUT_SECS", 5)?,
                visibility_timeout_secs: int_var_or("SNIPQ_VISIBILITY_TIMEOUT_SECS", 60)?,
            },
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn int_var_or(name: &str, default: i32) -> Result<i32> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be an integer, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
