//! Application configuration loaded from environment variables.

use std::time::Duration;

use workflow::{RetryPolicy, WorkflowConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` or `text` (default: `text`)
/// - `WORKFLOW_MAX_RETRIES`: retries per step (default: `3`)
/// - `WORKFLOW_BASE_DELAY_MS`: first backoff delay (default: `500`)
/// - `WORKFLOW_MAX_DELAY_MS`: backoff cap (default: `30000`)
/// - `WORKFLOW_STEP_TIMEOUT_MS`: per-attempt timeout (default: `30000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key).map_or(default, Duration::from_millis)
        };

        let retry = RetryPolicy::new(
            parsed("WORKFLOW_MAX_RETRIES")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.workflow.retry.max_retries),
            millis("WORKFLOW_BASE_DELAY_MS", defaults.workflow.retry.base_delay),
            millis("WORKFLOW_MAX_DELAY_MS", defaults.workflow.retry.max_delay),
        );

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            workflow: WorkflowConfig::default()
                .with_retry(retry)
                .with_step_timeout(millis(
                    "WORKFLOW_STEP_TIMEOUT_MS",
                    defaults.workflow.step_timeout,
                )),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            workflow: WorkflowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.workflow, WorkflowConfig::default());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.workflow.retry.max_retries, 3);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("WORKFLOW_MAX_RETRIES", "5"),
            ("WORKFLOW_BASE_DELAY_MS", "100"),
            ("WORKFLOW_MAX_DELAY_MS", "2000"),
            ("WORKFLOW_STEP_TIMEOUT_MS", "750"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.workflow.retry.max_retries, 5);
        assert_eq!(config.workflow.retry.base_delay, Duration::from_millis(100));
        assert_eq!(config.workflow.retry.max_delay, Duration::from_secs(2));
        assert_eq!(config.workflow.step_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("WORKFLOW_MAX_RETRIES", "-1"),
            ("LOG_FORMAT", "yaml"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.workflow.retry.max_retries, 3);
        assert_eq!(config.log_format, LogFormat::Text);
    }
}
